//! Provider-neutral message model.
//!
//! A message body is a tree of [`Part`]s. Leaves carry a transport-encoded
//! payload, containers carry ordered children. Trees come from decoding
//! provider JSON, so they are finite and acyclic by construction.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Leaf {
        mime_type: String,
        payload: Option<String>,
    },
    Multipart {
        mime_type: String,
        children: Vec<Part>,
    },
}

impl Part {
    pub fn leaf(mime_type: impl Into<String>, payload: Option<String>) -> Self {
        Part::Leaf {
            mime_type: mime_type.into(),
            payload: payload.filter(|p| !p.is_empty()),
        }
    }

    pub fn multipart(mime_type: impl Into<String>, children: Vec<Part>) -> Self {
        Part::Multipart {
            mime_type: mime_type.into(),
            children,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Part::Leaf { mime_type, .. } | Part::Multipart { mime_type, .. } => mime_type,
        }
    }

    /// Inline payload, present only on leaves that actually carry data.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Part::Leaf { payload, .. } => payload.as_deref(),
            Part::Multipart { .. } => None,
        }
    }

    pub fn children(&self) -> &[Part] {
        match self {
            Part::Leaf { .. } => &[],
            Part::Multipart { children, .. } => children,
        }
    }

    /// The list a level-first search starts from: a container's children, or
    /// the part itself when the message is not multipart.
    pub fn top_level(&self) -> &[Part] {
        match self {
            Part::Leaf { .. } => std::slice::from_ref(self),
            Part::Multipart { children, .. } => children,
        }
    }

    /// Case-insensitive comparison of the mime essence, ignoring parameters.
    pub fn is_mime(&self, essence: &str) -> bool {
        let own = self.mime_type().split(';').next().unwrap_or("").trim();
        own.eq_ignore_ascii_case(essence)
    }

    /// Depth-first, pre-order walk over this part and all descendants.
    pub fn walk(&self) -> Worklist<'_> {
        Worklist::new(self)
    }
}

/// Explicit traversal worklist.
///
/// Popping takes from the front. When a container is popped its children are
/// pushed onto the *front*, in their original order, so a part's descendants
/// are always visited before any sibling that was already pending. The first
/// matching part in document order therefore wins any tie.
pub struct Worklist<'a> {
    pending: VecDeque<&'a Part>,
}

impl<'a> Worklist<'a> {
    pub fn new(root: &'a Part) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(root);
        Self { pending }
    }

    fn push_front_all(&mut self, parts: &'a [Part]) {
        for part in parts.iter().rev() {
            self.pending.push_front(part);
        }
    }
}

impl<'a> Iterator for Worklist<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.pending.pop_front()?;
        self.push_front_all(part.children());
        Some(part)
    }
}

/// One provider message, owned only for the duration of a fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub headers: Vec<Header>,
    pub root: Part,
}

impl RawMessage {
    /// First header value whose name matches case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}
