//! Helpers for comparing local imports with the server's listing. They work
//! on both local records and remote payloads so the download screens can mix
//! them freely.

use crate::models::{DocumentGroup, SongBundle};
use crate::remote::{RemoteDocumentGroup, RemoteSongBundle};

/// Something imported from (or listed by) the server.
pub trait Syncable {
    fn uuid(&self) -> &str;
    fn hash(&self) -> Option<&str>;
    fn language(&self) -> &str;
}

macro_rules! impl_syncable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Syncable for $ty {
                fn uuid(&self) -> &str {
                    &self.uuid
                }

                fn hash(&self) -> Option<&str> {
                    self.hash.as_deref()
                }

                fn language(&self) -> &str {
                    &self.language
                }
            }
        )+
    };
}

impl_syncable!(SongBundle, DocumentGroup, RemoteSongBundle, RemoteDocumentGroup);

/// Distinct languages in first-seen order.
pub fn languages<T: Syncable>(items: &[T]) -> Vec<String> {
    let mut languages: Vec<String> = Vec::new();
    for item in items {
        if !languages.iter().any(|language| language == item.language()) {
            languages.push(item.language().to_string());
        }
    }
    languages
}

/// The most common language, preselected in the download filter. Ties go to
/// the language seen first; empty input yields an empty string.
pub fn default_filter_language<T: Syncable>(items: &[T]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in items {
        match counts
            .iter_mut()
            .find(|(language, _)| *language == item.language())
        {
            Some((_, count)) => *count += 1,
            None => counts.push((item.language(), 1)),
        }
    }

    counts
        .into_iter()
        .reduce(|best, next| if next.1 > best.1 { next } else { best })
        .map(|(language, _)| language.to_string())
        .unwrap_or_default()
}

/// Whether the server lists `local` (matched by uuid) with a different hash.
pub fn has_update<R: Syncable, L: Syncable>(remote: &[R], local: &L) -> bool {
    remote
        .iter()
        .find(|candidate| candidate.uuid() == local.uuid())
        .is_some_and(|candidate| candidate.hash() != local.hash())
}
