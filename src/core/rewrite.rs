//! Purpose: Stream a JSON request body while renaming deprecated keys to canonical names.
//! Exports: `KeyRewriter`, `RewriteOptions`.
//! Role: Decode-side half of field aliasing; a transparent `io::Read` adapter for serde.
//! Invariants: Single forward pass; memory is O(depth) plus one candidate key.
//! Invariants: String values are never rewritten, only confirmed keys (string followed by `:`).
//! Invariants: A conflict or limit error is terminal; every later read returns it again.
//! Notes: Malformed input is copied through; the downstream deserializer rejects it.
use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;

use crate::core::error::{AliasConflict, Error};
use crate::core::rules::RuleSet;
use crate::core::scan::{decode_key, is_ws, max_raw_key_len, quote_key};
use crate::core::scope::ScopeStack;

const READ_CHUNK: usize = 4096;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RewriteOptions {
    pub max_depth: Option<usize>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Lex {
    Structure,
    Value { escaped: bool },
    Candidate { escaped: bool },
    AfterCandidate,
}

/// Identity -> spelling first seen for it in one object.
type SeenKeys = HashMap<String, String>;

pub struct KeyRewriter<R> {
    source: R,
    rules: Arc<RuleSet>,
    chunk: Box<[u8]>,
    out: Vec<u8>,
    out_pos: usize,
    // Pending string that may be a key, plus whitespace seen after it.
    token: Vec<u8>,
    token_ws: Vec<u8>,
    token_offset: u64,
    max_token: usize,
    lex: Lex,
    expect_key: bool,
    scopes: ScopeStack<SeenKeys>,
    offset: u64,
    deprecated: Vec<String>,
    halted: Option<Error>,
    source_done: bool,
}

impl<R: Read> KeyRewriter<R> {
    pub fn new(source: R, rules: Arc<RuleSet>) -> Self {
        Self::with_options(source, rules, RewriteOptions::default())
    }

    pub fn with_options(source: R, rules: Arc<RuleSet>, options: RewriteOptions) -> Self {
        let max_token = max_raw_key_len(rules.max_name_len());
        Self {
            source,
            rules,
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
            out: Vec::with_capacity(READ_CHUNK),
            out_pos: 0,
            token: Vec::new(),
            token_ws: Vec::new(),
            token_offset: 0,
            max_token,
            lex: Lex::Structure,
            expect_key: false,
            scopes: ScopeStack::new(options.max_depth),
            offset: 0,
            deprecated: Vec::new(),
            halted: None,
            source_done: false,
        }
    }

    /// Deprecated key names seen so far, in first-seen order.
    pub fn deprecated_keys(&self) -> &[String] {
        &self.deprecated
    }

    pub fn conflict(&self) -> Option<&AliasConflict> {
        self.halted.as_ref().and_then(Error::alias_conflict)
    }

    pub fn terminal_error(&self) -> Option<&Error> {
        self.halted.as_ref()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn step(&mut self, byte: u8) -> Result<(), Error> {
        match self.lex {
            Lex::Value { escaped } => {
                self.out.push(byte);
                self.lex = match (escaped, byte) {
                    (false, b'\\') => Lex::Value { escaped: true },
                    (false, b'"') => Lex::Structure,
                    _ => Lex::Value { escaped: false },
                };
                Ok(())
            }
            Lex::Candidate { escaped } => {
                self.token.push(byte);
                self.lex = match (escaped, byte) {
                    (false, b'\\') => Lex::Candidate { escaped: true },
                    (false, b'"') => Lex::AfterCandidate,
                    _ => Lex::Candidate { escaped: false },
                };
                if let Lex::Candidate { escaped } = self.lex {
                    if self.token.len() > self.max_token {
                        // Too long to match any rule; stream the rest untouched.
                        self.out.append(&mut self.token);
                        self.lex = Lex::Value { escaped };
                    }
                }
                Ok(())
            }
            Lex::AfterCandidate => {
                if is_ws(byte) {
                    self.token_ws.push(byte);
                    return Ok(());
                }
                if byte == b':' {
                    self.commit_key()?;
                } else {
                    self.flush_candidate();
                }
                self.lex = Lex::Structure;
                self.structural(byte)
            }
            Lex::Structure => self.structural(byte),
        }
    }

    fn structural(&mut self, byte: u8) -> Result<(), Error> {
        match byte {
            b'"' if self.expect_key && self.scopes.in_object() && !self.rules.is_empty() => {
                self.token.clear();
                self.token_ws.clear();
                self.token.push(byte);
                self.token_offset = self.offset;
                self.lex = Lex::Candidate { escaped: false };
                self.expect_key = false;
            }
            b'"' => {
                self.out.push(byte);
                self.lex = Lex::Value { escaped: false };
                self.expect_key = false;
            }
            b'{' => {
                self.scopes.open_object(self.offset)?;
                self.out.push(byte);
                self.expect_key = true;
            }
            b'[' => {
                self.scopes.open_array(self.offset)?;
                self.out.push(byte);
                self.expect_key = false;
            }
            b'}' | b']' => {
                self.scopes.close();
                self.out.push(byte);
                self.expect_key = false;
            }
            b',' => {
                self.out.push(byte);
                self.expect_key = self.scopes.in_object();
            }
            _ if is_ws(byte) => self.out.push(byte),
            _ => {
                self.out.push(byte);
                self.expect_key = false;
            }
        }
        Ok(())
    }

    fn commit_key(&mut self) -> Result<(), Error> {
        let name = decode_key(&self.token);
        let Some((spelling, identity)) = name
            .as_deref()
            .and_then(|name| self.rules.identity_of(name).map(|identity| (name, identity)))
        else {
            self.out.extend_from_slice(&self.token);
            self.out.extend_from_slice(&self.token_ws);
            return Ok(());
        };

        if let Some(canonical) = self.rules.canonical_of(spelling) {
            self.out.extend_from_slice(&quote_key(canonical));
            if !self.deprecated.iter().any(|seen| seen == spelling) {
                self.deprecated.push(spelling.to_string());
            }
        } else {
            self.out.extend_from_slice(&self.token);
        }
        self.out.extend_from_slice(&self.token_ws);

        if let Some((_, seen)) = self.scopes.current() {
            match seen.get(identity) {
                Some(first) if first != spelling => {
                    let conflict = self.rules.alias_conflict(first, spelling);
                    return Err(Error::conflict(conflict).with_offset(self.token_offset));
                }
                Some(_) => {}
                None => {
                    seen.insert(identity.to_string(), spelling.to_string());
                }
            }
        }
        Ok(())
    }

    fn flush_candidate(&mut self) {
        self.out.append(&mut self.token);
        self.out.append(&mut self.token_ws);
    }

    fn finish(&mut self) {
        if matches!(self.lex, Lex::Candidate { .. } | Lex::AfterCandidate) {
            self.flush_candidate();
        }
        self.lex = Lex::Structure;
    }
}

impl<R: Read> Read for KeyRewriter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(err) = &self.halted {
                return Err(err.replicate().into_io());
            }
            if buf.is_empty() {
                return Ok(0);
            }
            if self.out_pos < self.out.len() {
                let n = (self.out.len() - self.out_pos).min(buf.len());
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                if self.out_pos == self.out.len() {
                    self.out.clear();
                    self.out_pos = 0;
                }
                return Ok(n);
            }
            if self.source_done {
                return Ok(0);
            }

            let read = match self.source.read(&mut self.chunk) {
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if read == 0 {
                self.finish();
                self.source_done = true;
                continue;
            }
            for idx in 0..read {
                let byte = self.chunk[idx];
                if let Err(err) = self.step(byte) {
                    self.halted = Some(err);
                    break;
                }
                self.offset += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyRewriter, RewriteOptions};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::rules::{AliasRule, RuleSet};
    use std::io::{self, Read};
    use std::sync::Arc;

    fn rules(pairs: &[(&str, &str)]) -> Arc<RuleSet> {
        Arc::new(RuleSet::new(
            pairs
                .iter()
                .map(|(old, new)| AliasRule::new(*old, *new).expect("rule")),
        ))
    }

    fn rewrite(input: &str, pairs: &[(&str, &str)]) -> (String, Vec<String>) {
        let mut rewriter = KeyRewriter::new(input.as_bytes(), rules(pairs));
        let mut out = String::new();
        rewriter.read_to_string(&mut out).expect("rewrite");
        (out, rewriter.deprecated_keys().to_vec())
    }

    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn renames_key_and_preserves_bytes() {
        let (out, used) = rewrite(r#"{"team_id" : 42, "name": "x"}"#, &[("team_id", "fleet_id")]);
        assert_eq!(out, r#"{"fleet_id" : 42, "name": "x"}"#);
        assert_eq!(used, ["team_id"]);
    }

    #[test]
    fn string_values_are_untouched() {
        let input = r#"{"name": "team_id", "tags": ["team_id", {"team_id": "team_id"}]}"#;
        let (out, _) = rewrite(input, &[("team_id", "fleet_id")]);
        assert_eq!(
            out,
            r#"{"name": "team_id", "tags": ["team_id", {"fleet_id": "team_id"}]}"#
        );
    }

    #[test]
    fn empty_rules_pass_through_verbatim() {
        let input = "{\"team_id\":1,\n \"x\": [true, null]}";
        let (out, used) = rewrite(input, &[]);
        assert_eq!(out, input);
        assert!(used.is_empty());
    }

    #[test]
    fn pending_key_survives_single_byte_reads() {
        let input = br#"{"team_id"   :   {"team_id": [1, "a\"b"]}, "z": "team_id"}"#;
        let mut rewriter = KeyRewriter::new(
            Trickle {
                data: input,
                step: 1,
            },
            rules(&[("team_id", "fleet_id")]),
        );
        let mut out = String::new();
        rewriter.read_to_string(&mut out).expect("rewrite");
        assert_eq!(
            out,
            r#"{"fleet_id"   :   {"fleet_id": [1, "a\"b"]}, "z": "team_id"}"#
        );
    }

    #[test]
    fn conflict_is_terminal() {
        let mut rewriter = KeyRewriter::new(
            br#"{"fleet_id": 1, "team_id": 2}"#.as_slice(),
            rules(&[("team_id", "fleet_id")]),
        );
        let mut out = Vec::new();
        let err = rewriter.read_to_end(&mut out).expect_err("conflict");
        let err = Error::from_io(err);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.offset(), Some(16));

        let conflict = rewriter.conflict().expect("conflict").clone();
        assert_eq!(conflict.old, "team_id");
        assert_eq!(conflict.new, "fleet_id");

        let mut buf = [0u8; 8];
        assert!(rewriter.read(&mut buf).is_err());
        assert!(rewriter.read(&mut buf).is_err());
    }

    #[test]
    fn repeated_spelling_is_not_a_conflict() {
        let (out, used) = rewrite(r#"{"team_id":1,"team_id":2}"#, &[("team_id", "fleet_id")]);
        assert_eq!(out, r#"{"fleet_id":1,"fleet_id":2}"#);
        assert_eq!(used, ["team_id"]);
    }

    #[test]
    fn chains_resolve_to_final_name() {
        let (out, used) = rewrite(r#"{"a":1,"x":{"b":2}}"#, &[("a", "b"), ("b", "c")]);
        assert_eq!(out, r#"{"c":1,"x":{"c":2}}"#);
        assert_eq!(used, ["a", "b"]);
    }

    #[test]
    fn overlong_keys_stream_without_buffering() {
        let long_key = "k".repeat(10_000);
        let input = format!(r#"{{"{long_key}":"team_id","team_id":1}}"#);
        let (out, _) = rewrite(&input, &[("team_id", "fleet_id")]);
        assert_eq!(out, format!(r#"{{"{long_key}":"team_id","fleet_id":1}}"#));
    }

    #[test]
    fn unterminated_input_is_copied_through() {
        let (out, _) = rewrite(r#"{"team_id"#, &[("team_id", "fleet_id")]);
        assert_eq!(out, r#"{"team_id"#);
        let (out, _) = rewrite(r#"{"team_id"  "#, &[("team_id", "fleet_id")]);
        assert_eq!(out, r#"{"team_id"  "#);
    }

    #[test]
    fn depth_limit_halts_the_stream() {
        let mut rewriter = KeyRewriter::with_options(
            b"[[[[1]]]]".as_slice(),
            rules(&[("team_id", "fleet_id")]),
            RewriteOptions { max_depth: Some(3) },
        );
        let mut out = Vec::new();
        let err = Error::from_io(rewriter.read_to_end(&mut out).expect_err("limit"));
        assert_eq!(err.kind(), ErrorKind::Limit);
        assert!(rewriter.conflict().is_none());
    }

    #[test]
    fn upstream_errors_propagate_unchanged() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
            }
        }
        let mut rewriter = KeyRewriter::new(Broken, rules(&[("team_id", "fleet_id")]));
        let mut out = Vec::new();
        let err = rewriter.read_to_end(&mut out).expect_err("upstream");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
