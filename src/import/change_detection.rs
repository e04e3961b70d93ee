//! Field-level equality between a stored contact and an incoming candidate.
//!
//! Both sides are projected into a [`ContactFingerprint`]; the fingerprint's
//! derived equality *is* the comparison policy:
//!
//! - `name` and `email` compare exactly after trimming, `status` compares exactly
//! - `phone`, `company`, `title` and `notes` treat `None`, `""` and
//!   whitespace-only values as the same "no value"
//! - `sentiment` compares as an option (blank input already parsed to `None`)
//! - `source` compares as a set, so tag order never registers as a change

use crate::import::candidate::CandidateRecord;
use crate::import::normalize::{blank_to_none, source_set};
use crate::models::{Contact, LeadStatus, Sentiment};
use std::collections::BTreeSet;

/// Normalized, comparable view of a contact's user-editable fields.
#[derive(Debug, PartialEq, Eq)]
pub struct ContactFingerprint<'a> {
    name: &'a str,
    email: &'a str,
    status: LeadStatus,
    phone: Option<&'a str>,
    company: Option<&'a str>,
    title: Option<&'a str>,
    notes: Option<&'a str>,
    sentiment: Option<Sentiment>,
    source: BTreeSet<&'a str>,
}

impl<'a> From<&'a Contact> for ContactFingerprint<'a> {
    fn from(contact: &'a Contact) -> Self {
        Self {
            name: contact.name.trim(),
            email: contact.email.trim(),
            status: contact.status,
            phone: blank_to_none(contact.phone.as_deref()),
            company: blank_to_none(contact.company.as_deref()),
            title: blank_to_none(contact.title.as_deref()),
            notes: blank_to_none(contact.notes.as_deref()),
            sentiment: contact.sentiment,
            source: source_set(&contact.source),
        }
    }
}

impl<'a> From<&'a CandidateRecord> for ContactFingerprint<'a> {
    fn from(candidate: &'a CandidateRecord) -> Self {
        Self {
            name: candidate.name.trim(),
            email: candidate.email.trim(),
            status: candidate.status,
            phone: blank_to_none(candidate.phone.as_deref()),
            company: blank_to_none(candidate.company.as_deref()),
            title: blank_to_none(candidate.title.as_deref()),
            notes: blank_to_none(candidate.notes.as_deref()),
            sentiment: candidate.sentiment,
            source: source_set(&candidate.source),
        }
    }
}

/// Whether `candidate` would materially change `existing`.
///
/// The candidate's email is expected to be normalized already; matching
/// happened on the normalized key.
pub fn has_changed(existing: &Contact, candidate: &CandidateRecord) -> bool {
    ContactFingerprint::from(existing) != ContactFingerprint::from(candidate)
}
