use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

/// Output bound for single-message detail bodies, which are shown whole.
pub const DEFAULT_DETAIL_OUTPUT_CHARS: usize = 100_000;

/// Bounds applied to every decoded body payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeLimits {
    /// Encoded inputs longer than this are only decoded up to this many characters.
    pub max_encoded_length: usize,
    /// Decoded text is cut to this many characters.
    pub safe_output_chars: usize,
    /// Appended when the encoded input exceeded `max_encoded_length`.
    pub truncation_marker: String,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_encoded_length: 200_000,
            safe_output_chars: 2000,
            truncation_marker: "\n\n<<content truncated>>".to_string(),
        }
    }
}

impl DecodeLimits {
    /// Limits loosened so a body of up to `output_chars` characters decodes
    /// intact. Never tighter than `self`.
    pub fn widened(&self, output_chars: usize) -> DecodeLimits {
        DecodeLimits {
            max_encoded_length: self
                .max_encoded_length
                .max(output_chars.saturating_mul(4)),
            safe_output_chars: self.safe_output_chars.max(output_chars),
            truncation_marker: self.truncation_marker.clone(),
        }
    }
}

/// Decoder for the URL-safe base64 variant the mail provider uses for inline bodies.
#[derive(Debug, Clone)]
pub struct ContentDecoder {
    limits: DecodeLimits,
    engine: GeneralPurpose,
}

impl Default for ContentDecoder {
    fn default() -> Self {
        Self::new(DecodeLimits::default())
    }
}

impl ContentDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        // Padding is restored by hand before decoding; trailing bits are tolerated
        // because the oversized path decodes an arbitrary prefix.
        let config = GeneralPurposeConfig::new()
            .with_decode_padding_mode(DecodePaddingMode::RequireCanonical)
            .with_decode_allow_trailing_bits(true);
        Self {
            limits,
            engine: GeneralPurpose::new(&alphabet::STANDARD, config),
        }
    }

    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    /// Decode a transport-encoded payload into bounded text.
    ///
    /// Malformed input yields an empty string; the failure is logged and
    /// never propagated.
    pub fn decode(&self, encoded: &str) -> String {
        let oversized = encoded.len() > self.limits.max_encoded_length;
        let slice = if oversized {
            // Cut on a 4-character quantum so the prefix stays decodable. The
            // transport alphabet is ASCII, so any byte offset is a char boundary
            // for valid input.
            let cut = self.limits.max_encoded_length - self.limits.max_encoded_length % 4;
            match encoded.get(..cut) {
                Some(prefix) => prefix,
                None => {
                    log::warn!("Encoded body is not ASCII, skipping decode");
                    return String::new();
                }
            }
        } else {
            encoded
        };

        let bytes = match self.engine.decode(to_standard_alphabet(slice)) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to decode body payload ({} chars): {e}", slice.len());
                return String::new();
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut output = truncate_chars(&text, self.limits.safe_output_chars);
        if oversized {
            log::debug!(
                "Body payload of {} chars exceeds {}, truncated",
                encoded.len(),
                self.limits.max_encoded_length
            );
            output.push_str(&self.limits.truncation_marker);
        }
        output
    }
}

/// Map the URL-safe alphabet onto the standard one and restore `=` padding.
fn to_standard_alphabet(input: &str) -> String {
    let mut out: String = input
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
