//! Secret matcher (C3): compile N named regex rules once and scan arbitrary
//! text for matches, abstracted over a fast multi-pattern backend and a
//! simple per-rule fallback.

use crate::entity::Secret;
use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use std::sync::OnceLock;

/// Capability interface for anything that scans text for secrets. The URL
/// extractor (C4) reuses the same interface for its "regex URL finder"
/// ruleset.
pub trait Handler: Send + Sync {
    fn handle(&self, text: &str) -> Result<Vec<Secret>, HandlerError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("fast regex backend used before init()")]
    NotInitialized,
    #[error("failed to compile regex rule {name:?}: {source}")]
    Compile {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Which scanning strategy a [`SecretMatcher`] uses. Chosen once at
/// construction (a process-wide decision) and never changed within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Single-pass `RegexSet` scan to find which rules hit at all, then
    /// per-rule `Regex` re-scans only the rules that matched to recover
    /// spans/groups. Stands in for the original's hyperscan database.
    Fast,
    /// Iterate every rule's compiled `Regex` directly. Always available,
    /// used when the fast backend is unavailable or disabled.
    Fallback,
}

/// Select the backend to use on this host. A Cargo feature stands in for the
/// "fast backend may be unavailable on some platforms" host check: hosts
/// built without `fast-regex` transparently get the fallback with no error.
pub fn select_backend() -> Backend {
    if cfg!(feature = "fast-regex") {
        Backend::Fast
    } else {
        Backend::Fallback
    }
}

/// Compiles N named rules once and scans text against all of them.
pub struct SecretMatcher {
    names: Vec<String>,
    regexes: Vec<Regex>,
    backend: Backend,
    regex_set: OnceLock<RegexSet>,
}

impl SecretMatcher {
    /// Compile `rules` (name -> regex source, case-insensitive) for the
    /// given backend. The `Fast` backend additionally requires an explicit
    /// call to [`SecretMatcher::init`] before [`Handler::handle`] succeeds.
    pub fn new<I, S1, S2>(rules: I, backend: Backend) -> Result<Self, HandlerError>
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: Into<String>,
        S2: Into<String>,
    {
        let mut names = Vec::new();
        let mut regexes = Vec::new();
        for (name, source) in rules {
            let name = name.into();
            let source = source.into();
            let regex = RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .map_err(|source| HandlerError::Compile {
                    name: name.clone(),
                    source,
                })?;
            names.push(name);
            regexes.push(regex);
        }
        Ok(SecretMatcher {
            names,
            regexes,
            backend,
            regex_set: OnceLock::new(),
        })
    }

    /// Convenience constructor that picks the backend via
    /// [`select_backend`], then eagerly initializes it.
    pub fn new_auto<I, S1, S2>(rules: I) -> Result<Self, HandlerError>
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: Into<String>,
        S2: Into<String>,
    {
        let matcher = Self::new(rules, select_backend())?;
        matcher.init()?;
        Ok(matcher)
    }

    /// Build the `RegexSet` for the `Fast` backend. A no-op for `Fallback`.
    pub fn init(&self) -> Result<(), HandlerError> {
        if self.backend != Backend::Fast {
            return Ok(());
        }
        if self.regex_set.get().is_some() {
            return Ok(());
        }
        let set = RegexSetBuilder::new(self.regexes.iter().map(|r| r.as_str()))
            .case_insensitive(true)
            .build()
            .map_err(|source| HandlerError::Compile {
                name: "<regex set>".to_string(),
                source,
            })?;
        let _ = self.regex_set.set(set);
        Ok(())
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn rule_names(&self) -> &[String] {
        &self.names
    }

    fn extract_with(name: &str, regex: &Regex, text: &str, out: &mut Vec<Secret>) {
        for caps in regex.captures_iter(text) {
            let matched = caps.get(1).or_else(|| caps.get(0));
            if let Some(matched) = matched {
                out.push(Secret::new(name, matched.as_str()));
            }
        }
    }

    fn handle_fallback(&self, text: &str) -> Vec<Secret> {
        let mut results = Vec::new();
        for (name, regex) in self.names.iter().zip(self.regexes.iter()) {
            Self::extract_with(name, regex, text, &mut results);
        }
        results
    }

    fn handle_fast(&self, text: &str, set: &RegexSet) -> Vec<Secret> {
        let mut results = Vec::new();
        for idx in set.matches(text).iter() {
            Self::extract_with(&self.names[idx], &self.regexes[idx], text, &mut results);
        }
        results
    }
}

impl Handler for SecretMatcher {
    fn handle(&self, text: &str) -> Result<Vec<Secret>, HandlerError> {
        match self.backend {
            Backend::Fallback => Ok(self.handle_fallback(text)),
            Backend::Fast => {
                let set = self.regex_set.get().ok_or(HandlerError::NotInitialized)?;
                Ok(self.handle_fast(text, set))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn corpus() -> &'static str {
        r#"
        Contact us at admin@example.com or root@internal.org.
        Internal host: 10.0.0.5, also try 192.168.1.1.
        Source map leaked at /static/bundle.js.map
        token="abababababababababababababababab"
        "#
    }

    fn rules() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Email", r"\b(([a-z0-9][_|.])*[a-z0-9]+@([a-z0-9][-|_|.])*[a-z0-9]+\.([a-z]{2,}))\b"),
            (
                "Internal IP",
                r"[^0-9]((127\.0\.0\.1)|(10\.\d{1,3}\.\d{1,3}\.\d{1,3})|(172\.((1[6-9])|(2\d)|(3[01]))\.\d{1,3}\.\d{1,3})|(192\.168\.\d{1,3}\.\d{1,3}))",
            ),
            ("JS Map", r"\b([\w/]+?\.js\.map)"),
        ]
    }

    #[test]
    fn fallback_finds_every_rule_with_a_match() {
        let matcher = SecretMatcher::new(rules(), Backend::Fallback).unwrap();
        matcher.init().unwrap();
        let secrets = matcher.handle(corpus()).unwrap();
        let seen: HashSet<&str> = secrets.iter().map(|s| s.rule_name.as_str()).collect();
        assert!(seen.contains("Email"));
        assert!(seen.contains("Internal IP"));
        assert!(seen.contains("JS Map"));
    }

    #[test]
    fn fast_backend_matches_same_rule_set_as_fallback() {
        let fast = SecretMatcher::new(rules(), Backend::Fast).unwrap();
        fast.init().unwrap();
        let fallback = SecretMatcher::new(rules(), Backend::Fallback).unwrap();
        fallback.init().unwrap();

        let fast_names: HashSet<String> = fast
            .handle(corpus())
            .unwrap()
            .into_iter()
            .map(|s| s.rule_name)
            .collect();
        let fallback_names: HashSet<String> = fallback
            .handle(corpus())
            .unwrap()
            .into_iter()
            .map(|s| s.rule_name)
            .collect();
        assert_eq!(fast_names, fallback_names);
    }

    #[test]
    fn fast_backend_requires_init() {
        let fast = SecretMatcher::new(rules(), Backend::Fast).unwrap();
        let err = fast.handle(corpus()).unwrap_err();
        assert!(matches!(err, HandlerError::NotInitialized));
    }

    #[test]
    fn fallback_does_not_require_init() {
        let fallback = SecretMatcher::new(rules(), Backend::Fallback).unwrap();
        assert!(fallback.handle(corpus()).is_ok());
    }
}
