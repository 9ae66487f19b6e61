//! C1 addressing: the human-readable `devac://` canonical URI and relative
//! reference resolution against an explicit context.

use std::fmt;

use crate::error::ModelError;

const SCHEME: &str = "devac";

/// Where a relative reference (`#Symbol` or `./file#Symbol`) is resolved
/// against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriContext {
    pub repo: String,
    pub package: String,
    pub file: String,
}

/// A parsed `devac://repo/package/file#SymbolPath?version=branch&line=N`
/// address. Components other than `repo`/`package`/`file` may be absent for
/// less specific addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUri {
    pub repo: String,
    pub package: String,
    pub file: String,
    pub symbol_path: Option<String>,
    pub version: Option<String>,
    pub line: Option<u32>,
}

impl CanonicalUri {
    /// Parses a `devac://` URI, normalizing as it goes: scheme is matched
    /// case-insensitively, percent-escapes are decoded, and path slashes are
    /// canonicalized (empty segments collapsed).
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        let err = || ModelError::MalformedUri(input.to_string(), "expected devac://repo/package/file".into());

        let lower = input.trim();
        let scheme_end = lower.find("://").ok_or_else(err)?;
        if !lower[..scheme_end].eq_ignore_ascii_case(SCHEME) {
            return Err(ModelError::MalformedUri(
                input.to_string(),
                format!("unknown scheme `{}`", &lower[..scheme_end]),
            ));
        }
        let rest = &lower[scheme_end + 3..];

        let (path_part, fragment_part) = match rest.split_once('#') {
            Some((p, f)) => (p, Some(f)),
            None => (rest, None),
        };

        let segments = canonicalize_segments(path_part);
        if segments.len() < 3 {
            return Err(ModelError::MalformedUri(
                input.to_string(),
                "expected at least repo/package/file".into(),
            ));
        }
        let repo = percent_decode(&segments[0]);
        let package = percent_decode(&segments[1]);
        let file = segments[2..].iter().map(|s| percent_decode(s)).collect::<Vec<_>>().join("/");

        let mut symbol_path = None;
        let mut version = None;
        let mut line = None;

        if let Some(fragment) = fragment_part {
            let (symbol, query) = match fragment.split_once('?') {
                Some((s, q)) => (s, Some(q)),
                None => (fragment, None),
            };
            if !symbol.is_empty() {
                symbol_path = Some(percent_decode(symbol));
            }
            if let Some(query) = query {
                for pair in query.split('&') {
                    if pair.is_empty() {
                        continue;
                    }
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    match key {
                        "version" => version = Some(percent_decode(value)),
                        "line" => {
                            line = value.parse::<u32>().ok();
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(CanonicalUri {
            repo,
            package,
            file,
            symbol_path,
            version,
            line,
        })
    }

    /// Resolves a relative reference (`#Symbol` or `./file#Symbol`) against
    /// `ctx`, producing a canonical URI.
    pub fn resolve_relative_ref(reference: &str, ctx: &UriContext) -> Result<Self, ModelError> {
        let (file_part, fragment_part) = match reference.split_once('#') {
            Some((f, s)) => (f, Some(s)),
            None => (reference, None),
        };

        let file = if file_part.is_empty() {
            ctx.file.clone()
        } else {
            join_relative(&ctx.file, file_part)
        };

        let mut symbol_path = None;
        let mut version = None;
        let mut line = None;
        if let Some(fragment) = fragment_part {
            let (symbol, query) = match fragment.split_once('?') {
                Some((s, q)) => (s, Some(q)),
                None => (fragment, None),
            };
            if !symbol.is_empty() {
                symbol_path = Some(symbol.to_string());
            }
            if let Some(query) = query {
                for pair in query.split('&') {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    match key {
                        "version" => version = Some(value.to_string()),
                        "line" => line = value.parse::<u32>().ok(),
                        _ => {}
                    }
                }
            }
        }

        Ok(CanonicalUri {
            repo: ctx.repo.clone(),
            package: ctx.package.clone(),
            file,
            symbol_path,
            version,
            line,
        })
    }

    /// Returns the shortest relative form whose resolution against `ctx`
    /// equals `self`.
    pub fn to_relative(&self, ctx: &UriContext) -> String {
        let mut out = String::new();
        if self.repo != ctx.repo || self.package != ctx.package {
            // Not addressable relative to this context; fall back to the
            // full canonical form.
            return self.to_string();
        }
        if self.file != ctx.file {
            out.push_str(&self.file);
        }
        if let Some(symbol) = &self.symbol_path {
            out.push('#');
            out.push_str(symbol);
        }
        let mut query = Vec::new();
        if let Some(version) = &self.version {
            query.push(format!("version={version}"));
        }
        if let Some(line) = self.line {
            query.push(format!("line={line}"));
        }
        if !query.is_empty() {
            if self.symbol_path.is_none() {
                out.push('#');
            }
            out.push('?');
            out.push_str(&query.join("&"));
        }
        out
    }
}

impl fmt::Display for CanonicalUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}/{}/{}", self.repo, self.package, self.file)?;
        if let Some(symbol) = &self.symbol_path {
            write!(f, "#{symbol}")?;
        }
        let mut query = Vec::new();
        if let Some(version) = &self.version {
            query.push(format!("version={version}"));
        }
        if let Some(line) = self.line {
            query.push(format!("line={line}"));
        }
        if !query.is_empty() {
            if self.symbol_path.is_none() {
                f.write_str("#")?;
            }
            write!(f, "?{}", query.join("&"))?;
        }
        Ok(())
    }
}

fn canonicalize_segments(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}

fn join_relative(base_file: &str, relative: &str) -> String {
    let relative = relative.strip_prefix("./").unwrap_or(relative);
    if relative.starts_with("../") || relative.contains('/') && !base_file.contains('/') {
        return relative.to_string();
    }
    match base_file.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{relative}"),
        None => relative.to_string(),
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(value) = u8::from_str_radix(hex, 16) {
                    out.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_full_uri() {
        let uri = CanonicalUri::parse("devac://acme/widgets/src/a.ts#Widget.render?version=main&line=42").unwrap();
        assert_eq!(uri.repo, "acme");
        assert_eq!(uri.package, "widgets");
        assert_eq!(uri.file, "src/a.ts");
        assert_eq!(uri.symbol_path.as_deref(), Some("Widget.render"));
        assert_eq!(uri.version.as_deref(), Some("main"));
        assert_eq!(uri.line, Some(42));
    }

    #[test]
    fn parses_minimal_uri_without_fragment() {
        let uri = CanonicalUri::parse("devac://acme/widgets/src/a.ts").unwrap();
        assert_eq!(uri.file, "src/a.ts");
        assert!(uri.symbol_path.is_none());
        assert!(uri.version.is_none());
        assert!(uri.line.is_none());
    }

    #[test]
    fn scheme_match_is_case_insensitive() {
        let uri = CanonicalUri::parse("DEVAC://acme/widgets/a.ts").unwrap();
        assert_eq!(uri.repo, "acme");
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(CanonicalUri::parse("http://acme/widgets/a.ts").is_err());
    }

    #[test]
    fn rejects_missing_segments() {
        assert!(CanonicalUri::parse("devac://acme").is_err());
    }

    #[test]
    fn round_trips_through_parse_and_format() {
        let original = "devac://acme/widgets/src/a.ts#Widget.render?version=main&line=42";
        let parsed = CanonicalUri::parse(original).unwrap();
        let reparsed = CanonicalUri::parse(&parsed.to_string()).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn percent_escapes_decode_during_parse() {
        let uri = CanonicalUri::parse("devac://acme/widgets/src/a.ts#Widget%2Erender").unwrap();
        assert_eq!(uri.symbol_path.as_deref(), Some("Widget.render"));
    }

    #[test]
    fn resolves_relative_reference_against_context() {
        let ctx = UriContext {
            repo: "acme".into(),
            package: "widgets".into(),
            file: "src/a.ts".into(),
        };
        let resolved = CanonicalUri::resolve_relative_ref("#Widget.render", &ctx).unwrap();
        assert_eq!(resolved.repo, "acme");
        assert_eq!(resolved.file, "src/a.ts");
        assert_eq!(resolved.symbol_path.as_deref(), Some("Widget.render"));
    }

    #[test]
    fn resolves_relative_file_reference() {
        let ctx = UriContext {
            repo: "acme".into(),
            package: "widgets".into(),
            file: "src/a.ts".into(),
        };
        let resolved = CanonicalUri::resolve_relative_ref("./b.ts#Other", &ctx).unwrap();
        assert_eq!(resolved.file, "src/b.ts");
        assert_eq!(resolved.symbol_path.as_deref(), Some("Other"));
    }

    #[test]
    fn to_relative_is_shortest_form_that_resolves_back() {
        let ctx = UriContext {
            repo: "acme".into(),
            package: "widgets".into(),
            file: "src/a.ts".into(),
        };
        let canonical = CanonicalUri::parse("devac://acme/widgets/src/a.ts#Widget.render").unwrap();
        let relative = canonical.to_relative(&ctx);
        let resolved = CanonicalUri::resolve_relative_ref(&relative, &ctx).unwrap();
        assert_eq!(resolved, canonical);
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_generated_uris(
            repo in "[a-z]{1,10}",
            package in "[a-z]{1,10}",
            file in "[a-z]{1,8}\\.ts",
            symbol in "[A-Za-z]{1,10}",
            line in 1u32..10_000,
        ) {
            let input = format!("devac://{repo}/{package}/{file}#{symbol}?version=main&line={line}");
            let parsed = CanonicalUri::parse(&input).unwrap();
            let reparsed = CanonicalUri::parse(&parsed.to_string()).unwrap();
            prop_assert_eq!(parsed, reparsed);
        }
    }
}
