use serde::Serialize;

use super::SchemaVariant;
use crate::normalization::CanonicalRecord;

const SCORED_INSTRUCTIONS: &str = "\
You are an intelligent email classification assistant.
Analyze the content of each email (sender, subject, and snippet) and classify it into one of the following categories:
- Important: Emails that are personal, urgent, or from known contacts.
- Promotional: Marketing emails, newsletters, and offers.
- Social: Notifications from social media platforms.
- Spam: Unsolicited or malicious emails.
- General: All other emails that don't fit into the above categories.

Respond with a JSON object of the form {\"classifications\": [...]}, where each element contains:
- \"id\": The original email ID.
- \"category\": The predicted category.
- \"confidence\": A score from 0 to 1 indicating your confidence.
- \"reasoning\": A brief explanation for your classification.";

const ACTIONABLE_INSTRUCTIONS: &str = "\
You are an intelligent email classification assistant.
Analyze the content of each email (sender, subject, and snippet) and classify it into one of the following categories:
- Important: Emails that are personal, urgent, or from known contacts.
- Promotional: Offers, deals, and coupons.
- Social: Notifications from social media platforms.
- Marketing: Newsletters and brand campaigns.
- Spam: Unsolicited or malicious emails.
- General: All other emails that don't fit into the above categories.

Respond with a JSON object of the form {\"classifications\": [...]}, where each element contains:
- \"emailId\": The original email ID.
- \"classification\": an object with
  - \"category\": The predicted category.
  - \"summary\": A brief, one-sentence summary of the email content.
  - \"actionable\": true if the email requires a user action (reply, pay a bill, confirm a detail), false otherwise.";

/// The subset of a record that is sent to the model. The body preview is
/// deliberately absent.
#[derive(Debug, Serialize)]
struct PromptEntry<'a> {
    id: &'a str,
    sender: &'a str,
    subject: &'a str,
    snippet: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(records: &[CanonicalRecord], variant: SchemaVariant) -> Prompt {
    let entries: Vec<PromptEntry<'_>> = records
        .iter()
        .map(|r| PromptEntry {
            id: &r.id,
            sender: &r.sender,
            subject: &r.subject,
            snippet: &r.snippet,
        })
        .collect();
    // Serializing plain string fields cannot fail
    let listing = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string());

    let system = match variant {
        SchemaVariant::Scored => SCORED_INSTRUCTIONS,
        SchemaVariant::Actionable => ACTIONABLE_INSTRUCTIONS,
    };

    Prompt {
        system: system.to_string(),
        user: format!("Please classify the following emails:\n{listing}"),
    }
}
