//! Build context: everything about *this* invocation that ends up in the
//! rendered document.
//!
//! The context is resolved once from an [`EnvSnapshot`] at the start of a
//! build and passed by reference to every later stage. Nothing downstream
//! reads process environment variables directly, which keeps rendering
//! deterministic in tests.
//!
//! ## QR target URL
//!
//! The URL encoded in the QR code comes from an ordered rule table,
//! [`URL_RULES`]. Each rule is a `(predicate, resolver)` pair; the first rule
//! whose predicate matches wins:
//!
//! | Rule | Matches when |
//! |---|---|
//! | `explicit-preview` | `DEPLOY_PREVIEW_URL` is set |
//! | `preview-deploy` | Netlify deploy-preview/branch-deploy with `DEPLOY_PRIME_URL`, or Vercel preview with `VERCEL_URL` |
//! | `production-deploy` | Netlify production with `URL`, or Vercel production with `VERCEL_URL` |
//! | `lan-address` | a non-loopback IPv4 address was detected |
//! | `localhost` | always |

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, UdpSocket};
use std::process::Command;

/// `draft` skips images, QR codes and PDFs for fast iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Draft,
    #[default]
    Production,
}

impl BuildMode {
    pub fn is_draft(self) -> bool {
        self == BuildMode::Draft
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildMode::Draft => "draft",
            BuildMode::Production => "production",
        })
    }
}

/// Deployment environment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Preview,
    Development,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Production => "production",
            Environment::Preview => "preview",
            Environment::Development => "development",
        })
    }
}

/// Frozen view of the inputs the context depends on.
///
/// [`EnvSnapshot::capture`] reads the real process environment, probes the
/// LAN address and asks git for the commit. [`EnvSnapshot::from_pairs`]
/// builds one from literal values and never touches the system.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
    lan_ip: Option<Ipv4Addr>,
    git_commit: Option<String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
            lan_ip: detect_lan_ip(),
            git_commit: git_short_hash(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            lan_ip: None,
            git_commit: None,
        }
    }

    pub fn with_lan_ip(mut self, ip: Ipv4Addr) -> Self {
        self.lan_ip = Some(ip);
        self
    }

    pub fn with_git_commit(mut self, hash: impl Into<String>) -> Self {
        self.git_commit = Some(hash.into());
        self
    }

    /// Variable value; empty strings count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn is(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn lan_ip(&self) -> Option<Ipv4Addr> {
        self.lan_ip
    }

    fn netlify_context(&self) -> Option<&str> {
        self.get("CONTEXT")
    }

    fn is_netlify_preview(&self) -> bool {
        matches!(
            self.netlify_context(),
            Some("deploy-preview") | Some("branch-deploy")
        )
    }
}

// ============================================================================
// URL rules
// ============================================================================

/// One entry of the QR target URL rule table.
pub struct UrlRule {
    pub name: &'static str,
    pub applies: fn(&EnvSnapshot) -> bool,
    pub resolve: fn(&EnvSnapshot, u16) -> String,
}

/// Resolved QR target and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUrl {
    pub url: String,
    pub rule: &'static str,
}

pub const URL_RULES: &[UrlRule] = &[
    UrlRule {
        name: "explicit-preview",
        applies: |env| env.get("DEPLOY_PREVIEW_URL").is_some(),
        resolve: |env, _| env.get("DEPLOY_PREVIEW_URL").unwrap_or_default().to_string(),
    },
    UrlRule {
        name: "preview-deploy",
        applies: |env| {
            (env.is_netlify_preview() && env.get("DEPLOY_PRIME_URL").is_some())
                || (env.is("VERCEL_ENV", "preview") && env.get("VERCEL_URL").is_some())
        },
        resolve: |env, _| match env.get("DEPLOY_PRIME_URL") {
            Some(url) if env.is_netlify_preview() => url.to_string(),
            _ => with_https(env.get("VERCEL_URL").unwrap_or_default()),
        },
    },
    UrlRule {
        name: "production-deploy",
        applies: |env| {
            (env.get("URL").is_some()
                && (env.is("CONTEXT", "production") || env.is("NETLIFY", "true")))
                || (env.is("VERCEL_ENV", "production") && env.get("VERCEL_URL").is_some())
        },
        resolve: |env, _| {
            if env.is("VERCEL_ENV", "production")
                && let Some(url) = env.get("VERCEL_URL")
            {
                return with_https(url);
            }
            env.get("URL").unwrap_or_default().to_string()
        },
    },
    UrlRule {
        name: "lan-address",
        applies: |env| env.lan_ip().is_some(),
        resolve: |env, port| match env.lan_ip() {
            Some(ip) => format!("http://{ip}:{port}"),
            None => format!("http://localhost:{port}"),
        },
    },
    UrlRule {
        name: "localhost",
        applies: |_| true,
        resolve: |_, port| format!("http://localhost:{port}"),
    },
];

/// Walk [`URL_RULES`] top to bottom and return the first match.
pub fn resolve_qr_url(env: &EnvSnapshot, dev_port: u16) -> ResolvedUrl {
    URL_RULES
        .iter()
        .find(|rule| (rule.applies)(env))
        .map(|rule| ResolvedUrl {
            url: (rule.resolve)(env, dev_port),
            rule: rule.name,
        })
        .unwrap_or_else(|| ResolvedUrl {
            url: format!("http://localhost:{dev_port}"),
            rule: "localhost",
        })
}

fn with_https(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// First non-loopback IPv4 address of this host, if any.
///
/// Connecting a UDP socket sends no packets; it only makes the OS pick the
/// outbound interface.
pub fn detect_lan_ip() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

// ============================================================================
// Build context
// ============================================================================

/// Per-invocation state shared by every stage of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildContext {
    pub url: String,
    pub url_rule: &'static str,
    pub environment: Environment,
    pub version: String,
    pub commit: String,
    pub timestamp: String,
    pub ci: bool,
    pub mode: BuildMode,
}

impl BuildContext {
    /// Resolve the context from a snapshot.
    ///
    /// `config_version` is `site.version` from the config file; it loses to
    /// `RESUME_VERSION` and wins over the tool's own version.
    pub fn resolve(
        env: &EnvSnapshot,
        mode: BuildMode,
        config_version: Option<&str>,
        dev_port: u16,
    ) -> Self {
        let ResolvedUrl { url, rule } = resolve_qr_url(env, dev_port);
        Self {
            url,
            url_rule: rule,
            environment: resolve_environment(env),
            version: resolve_version(env, config_version),
            commit: resolve_commit(env),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ci: env.get("CI").is_some_and(|v| v != "false" && v != "0"),
            mode,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.mode.is_draft()
    }
}

pub fn resolve_environment(env: &EnvSnapshot) -> Environment {
    if env.is("CONTEXT", "production")
        || env.is("VERCEL_ENV", "production")
        || env.is("RESUME_ENV", "production")
    {
        Environment::Production
    } else if env.is_netlify_preview() || env.is("VERCEL_ENV", "preview") {
        Environment::Preview
    } else {
        Environment::Development
    }
}

pub fn resolve_commit(env: &EnvSnapshot) -> String {
    ["COMMIT_REF", "GITHUB_SHA", "VERCEL_GIT_COMMIT_SHA"]
        .iter()
        .find_map(|key| env.get(key))
        .or(env.git_commit.as_deref())
        .map(|hash| hash.chars().take(7).collect())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn resolve_version(env: &EnvSnapshot, config_version: Option<&str>) -> String {
    env.get("RESUME_VERSION")
        .or(config_version.map(str::trim).filter(|v| !v.is_empty()))
        .unwrap_or(env!("CARGO_PKG_VERSION"))
        .to_string()
}
