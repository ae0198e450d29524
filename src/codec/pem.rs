// Certvault — PEM framing
//
// RFC 7468 style armor: base64 (standard alphabet, padded) wrapped at 64
// columns between BEGIN/END lines. Anything outside a block is ignored, so
// `# comment` lines in front of the armor are harmless.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::DecodeError;

const LINE_WIDTH: usize = 64;
const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";

/// One armored block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    pub label: String,
    /// RFC 1421 headers (`Proc-Type`, `DEK-Info`, ...), in order.
    pub headers: Vec<(String, String)>,
    pub der: Vec<u8>,
}

impl PemBlock {
    fn is_encrypted(&self) -> bool {
        self.label.starts_with("ENCRYPTED ")
            || self
                .headers
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case("Proc-Type") && v.contains("ENCRYPTED"))
    }
}

/// Wrap `der` in PEM armor with the given label.
pub fn armor(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 2 * label.len() + 40);
    out.push_str(&format!("{}{}{}\n", BEGIN, label, DASHES));
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("{}{}{}\n", END, label, DASHES));
    out
}

fn marker_label<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)?.strip_suffix(DASHES)
}

/// Every armored block in `text`, in order. Encrypted blocks are rejected.
pub fn parse_blocks(text: &str) -> Result<Vec<PemBlock>, DecodeError> {
    let mut blocks = Vec::new();
    let mut lines = text.lines().map(str::trim);

    while let Some(line) = lines.next() {
        let Some(label) = marker_label(line, BEGIN) else {
            continue;
        };
        let label = label.to_string();
        let mut headers = Vec::new();
        let mut body = String::new();
        let mut closed = false;

        for line in lines.by_ref() {
            if let Some(end) = marker_label(line, END) {
                if end != label {
                    return Err(DecodeError::Armor(format!(
                        "BEGIN {} closed by END {}",
                        label, end
                    )));
                }
                closed = true;
                break;
            }
            if body.is_empty() {
                if let Some((k, v)) = line.split_once(':') {
                    headers.push((k.trim().to_string(), v.trim().to_string()));
                    continue;
                }
            }
            body.push_str(line);
        }

        if !closed {
            return Err(DecodeError::Armor(format!("missing END {}", label)));
        }

        let block = PemBlock {
            der: STANDARD.decode(body.as_bytes())?,
            label,
            headers,
        };
        if block.is_encrypted() {
            return Err(DecodeError::Encrypted);
        }
        blocks.push(block);
    }

    Ok(blocks)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
