//! Termination state and approval evaluation
//!
//! `TerminationState` tracks the turn budget of one round. Evaluators decide
//! from the latest transcript message whether the round is over.

use std::collections::HashSet;

use tracing::trace;

use crate::agent::transcript::Transcript;
use crate::core::Message;

/// Turn accounting for one negotiation round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationState {
    /// Agent invocations completed so far
    pub turn_count: usize,
    pub max_turns: usize,
    /// Set once approval is seen; never cleared within a round
    pub terminal: bool,
}

impl TerminationState {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turn_count: 0,
            max_turns,
            terminal: false,
        }
    }

    /// Whether another agent may be invoked
    pub fn should_continue(&self) -> bool {
        !self.terminal && self.turn_count < self.max_turns
    }

    /// Count a completed invocation
    pub fn record_turn(&mut self) {
        debug_assert!(self.turn_count < self.max_turns);
        self.turn_count += 1;
    }

    pub fn mark_terminal(&mut self) {
        self.terminal = true;
    }

    /// Budget spent without approval
    pub fn is_exhausted(&self) -> bool {
        !self.terminal && self.turn_count >= self.max_turns
    }
}

/// Decides whether a round should stop
pub trait TerminationEvaluator: Send + Sync {
    /// Inspect the transcript after a turn; true ends the round
    fn evaluate(&self, transcript: &Transcript) -> bool;
}

impl<F> TerminationEvaluator for F
where
    F: Fn(&Transcript) -> bool + Send + Sync,
{
    fn evaluate(&self, transcript: &Transcript) -> bool {
        self(transcript)
    }
}

/// Lower-case, fold punctuation to spaces and collapse whitespace.
/// Apostrophes survive so "it's" stays one word.
fn normalize(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '\'' => '\'',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and punctuation-insensitive whole-word phrase matcher
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    approval: String,
    rejection: Option<String>,
}

impl PhraseMatcher {
    pub fn new(approval_phrase: &str) -> Self {
        Self {
            approval: normalize(approval_phrase),
            rejection: None,
        }
    }

    /// Phrase that vetoes an approval match it overlaps
    pub fn with_rejection(mut self, rejection_phrase: &str) -> Self {
        let normalized = normalize(rejection_phrase);
        self.rejection = (!normalized.is_empty()).then_some(normalized);
        self
    }

    /// Word spans `[start, end)` where `needle` occurs in `words`
    fn spans(words: &[&str], needle: &str) -> Vec<(usize, usize)> {
        let needle: Vec<&str> = needle.split(' ').collect();
        if needle.len() > words.len() {
            return Vec::new();
        }
        words
            .windows(needle.len())
            .enumerate()
            .filter(|(_, window)| *window == needle.as_slice())
            .map(|(start, _)| (start, start + needle.len()))
            .collect()
    }

    /// Whether the text carries the approval phrase outside any rejection.
    ///
    /// A rejection only vetoes the approval it overlaps, so
    /// "the last plan was not approved, but itinerary approved" approves
    /// while "not approved" against the phrase "approved" does not.
    pub fn matches(&self, content: &str) -> bool {
        if self.approval.is_empty() {
            return false;
        }
        let text = normalize(content);
        let words: Vec<&str> = text.split(' ').collect();
        let rejections = match &self.rejection {
            Some(rejection) => Self::spans(&words, rejection),
            None => Vec::new(),
        };

        Self::spans(&words, &self.approval)
            .into_iter()
            .any(|(start, end)| {
                rejections
                    .iter()
                    .all(|&(r_start, r_end)| r_end <= start || r_start >= end)
            })
    }
}

/// Approval check used by the negotiation loop.
///
/// A structured verdict on the last message wins. Without one, the message
/// text is matched against the approval phrase. When approvers are set,
/// messages from anyone else never end the round.
#[derive(Debug, Clone)]
pub struct ApprovalEvaluator {
    matcher: PhraseMatcher,
    approvers: Option<HashSet<String>>,
}

impl ApprovalEvaluator {
    pub fn new(matcher: PhraseMatcher) -> Self {
        Self {
            matcher,
            approvers: None,
        }
    }

    /// Only messages authored by `name` can end the round
    pub fn restricted_to(mut self, name: impl Into<String>) -> Self {
        self.approvers
            .get_or_insert_with(HashSet::new)
            .insert(name.into());
        self
    }

    fn is_approver(&self, message: &Message) -> bool {
        match &self.approvers {
            Some(names) => names.iter().any(|name| message.is_from(name)),
            None => true,
        }
    }

    /// Verdict for a single message
    pub fn approves(&self, message: &Message) -> bool {
        if !self.is_approver(message) {
            return false;
        }
        match &message.decision {
            Some(decision) => decision.approved,
            None => self.matcher.matches(&message.content),
        }
    }
}

impl TerminationEvaluator for ApprovalEvaluator {
    fn evaluate(&self, transcript: &Transcript) -> bool {
        let Some(last) = transcript.last() else {
            return false;
        };
        let approved = self.approves(last);
        trace!(
            author = %last.author_name,
            index = last.sequence_index,
            approved,
            "Evaluated termination"
        );
        approved
    }
}
