//! Citation rendering boundary.
//!
//! Rendering proper is delegated to an external citeproc program: it gets
//! the CSL-JSON items on stdin, the stylesheet path and options as
//! arguments, and returns HTML. The "text" output is the same HTML (meant
//! for Markdown contexts); RTF is derived from it locally.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::app;
use crate::config::Config;
use crate::sync;

/// One rendered citation in every output format.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub html: String,
    pub text: String,
    pub rtf: String,
}

/// Render `csl_items` with the stylesheet at `style_path`.
pub fn generate(
    csl_items: &[Value],
    style_path: &Path,
    bibliography: bool,
    locale: Option<&str>,
    command: &str,
) -> Result<Rendition> {
    let payload = serde_json::to_string(csl_items)?;

    let mut cmd = Command::new(command);
    if bibliography {
        cmd.arg("--bibliography");
    }
    if let Some(locale) = locale {
        cmd.args(["--locale", locale]);
    }
    cmd.arg(style_path);

    debug!(?cmd, "invoking citeproc");
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run '{command}'"))?;

    child
        .stdin
        .take()
        .context("citeproc stdin unavailable")?
        .write_all(payload.as_bytes())?;

    let output = child.wait_with_output()?;
    if !output.status.success() {
        anyhow::bail!(
            "'{command}' exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let html = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let rtf = html_to_rtf(&html);
    Ok(Rendition {
        text: html.clone(),
        html,
        rtf,
    })
}

/// Convert citation HTML to an RTF document.
///
/// Understands the inline formatting citeproc emits (`i`, `b`, `sup`,
/// `sub`); other tags are dropped. Non-ASCII text is escaped as RTF
/// unicode.
fn html_to_rtf(html: &str) -> String {
    let mut out = String::from("{\\rtf1\\ansi\\deff0\n");
    let mut rest = html;

    while let Some(i) = rest.find('<') {
        out.push_str(&rtf_encode(&rest[..i]));
        rest = &rest[i..];
        let Some(end) = rest.find('>') else {
            break;
        };
        let tag = rest[1..end].trim().to_lowercase();
        match tag.as_str() {
            "i" => out.push_str("\\i "),
            "/i" => out.push_str("\n\\i0 "),
            "b" => out.push_str("\\b "),
            "/b" => out.push_str("\n\\b0 "),
            "sup" | "super" => out.push_str("\\super "),
            "/sup" | "/super" => out.push_str("\n\\super0 "),
            "sub" => out.push_str("\\sub "),
            "/sub" => out.push_str("\n\\sub0 "),
            _ => debug!(tag = %tag, "dropping tag in RTF output"),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(&rtf_encode(rest));

    out.push_str("\n}");
    out
}

/// Escape plain text for RTF: control characters for `\`, `{`, `}`, and
/// `\uN?` escapes for anything outside ASCII.
fn rtf_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    // RTF \u takes a signed 16-bit decimal.
                    let signed = *unit as i32 - if *unit > 0x7FFF { 0x10000 } else { 0 };
                    out.push_str(&format!("\\u{signed}?"));
                }
            }
        }
    }
    out
}

/// CLI entry point for `refdex cite`.
pub async fn run_cite(
    config: &Config,
    id: i64,
    style: &str,
    bibliography: bool,
    locale: Option<&str>,
) -> Result<()> {
    let zotero = app::open_zotero(config).await?;
    let index = app::open_index(config).await?;
    sync::refresh(&index, &zotero, false).await?;

    let record = index
        .record(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("record not found: {id}"))?;
    if record.csl.as_object().map_or(true, |o| o.is_empty()) {
        anyhow::bail!(
            "record {id} has no citation mapping (type '{}')",
            record.kind
        );
    }

    let styles = app::open_styles(config, &zotero).await?;
    let rendition = styles
        .cite(&record, style, bibliography, locale, &config.cite.command)
        .await?;

    println!("--- HTML ---");
    println!("{}", rendition.html);
    println!();
    println!("--- Text ---");
    println!("{}", rendition.text);
    println!();
    println!("--- RTF ---");
    println!("{}", rendition.rtf);

    index.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtf_wraps_and_translates_tags() {
        let rtf = html_to_rtf("Plain <i>italic</i> and <b>bold</b>.");
        assert!(rtf.starts_with("{\\rtf1\\ansi\\deff0"));
        assert!(rtf.ends_with("}"));
        assert!(rtf.contains("\\i italic"));
        assert!(rtf.contains("\\b bold"));
    }

    #[test]
    fn rtf_drops_unknown_tags() {
        let rtf = html_to_rtf("<div>text</div>");
        assert!(rtf.contains("text"));
        assert!(!rtf.contains("div"));
    }

    #[test]
    fn rtf_escapes_unicode_and_braces() {
        let encoded = rtf_encode("Käse {x}");
        assert_eq!(encoded, "K\\u228?se \\{x\\}");
    }

    #[test]
    fn missing_renderer_is_an_error() {
        let err = generate(
            &[serde_json::json!({})],
            Path::new("style.csl"),
            false,
            None,
            "refdex-test-no-such-program",
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to run"));
    }
}
