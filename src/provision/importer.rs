//! Bulk account provisioning from loosely-formatted spreadsheet exports.
//!
//! The upload arrives as raw bytes of unknown encoding and column layout.
//! Decoding tries UTF-8 (BOM-aware), then Windows-1252, then a permissive
//! Latin-1 pass that cannot fail. The delimiter is detected from the
//! header line. Rows already present as accounts are skipped, so
//! re-importing the same file is a no-op.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::ImportError;
use crate::store::Database;
use crate::store::model::{AgentVariant, NewAccount};

/// Ordered substring rules mapping free-form variant labels onto the
/// closed enum. Evaluated top to bottom against the lowercased label;
/// first hit wins. `basic`/`gofai` are listed before `ai` so labels like
/// "GOFAI bot" don't fall into the primary bucket by substring accident.
const VARIANT_RULES: &[(&str, AgentVariant)] = &[
    ("basic", AgentVariant::Basic),
    ("gofai", AgentVariant::Basic),
    ("primary", AgentVariant::Primary),
    ("ai", AgentVariant::Primary),
];

/// Default when the label is absent or matches no rule.
const DEFAULT_VARIANT: AgentVariant = AgentVariant::Basic;

/// Column offset used when a row carries extra leading descriptive
/// columns (row number, full name, ...): identifier/password/variant then
/// sit in columns 2/3/4. Detection is by row width.
const OFFSET_LAYOUT_MIN_COLUMNS: usize = 5;
const OFFSET: usize = 2;

/// Outcome of one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// Accounts created by this run.
    pub created: usize,
    /// Rows skipped because the identifier already existed.
    pub skipped_existing: usize,
    /// Rows skipped because the identifier was blank.
    pub skipped_blank: usize,
}

/// Bulk importer. All database work for one run commits as a single
/// transaction; any failure rolls the whole run back.
pub struct Importer {
    store: Arc<dyn Database>,
    default_password: String,
}

impl Importer {
    pub fn new(store: Arc<dyn Database>, default_password: impl Into<String>) -> Self {
        Self {
            store,
            default_password: default_password.into(),
        }
    }

    /// Import a spreadsheet upload. Never panics; every failure surfaces
    /// as an `ImportError` the HTTP boundary renders as a diagnosis.
    pub async fn run(&self, bytes: &[u8]) -> Result<ImportOutcome, ImportError> {
        let text = decode_text(bytes)?;
        let rows = parse_rows(&text)?;

        let mut outcome = ImportOutcome::default();
        let mut batch: Vec<NewAccount> = Vec::new();

        for row in rows {
            let Some(parsed) = map_row(&row, &self.default_password) else {
                outcome.skipped_blank += 1;
                continue;
            };

            // Idempotence: identifiers that already exist (in the store or
            // earlier in this same file) are skipped, not duplicated.
            let exists_in_store = self
                .store
                .get_account_by_username(&parsed.username)
                .await?
                .is_some();
            let exists_in_batch = batch.iter().any(|a| a.username == parsed.username);
            if exists_in_store || exists_in_batch {
                outcome.skipped_existing += 1;
                continue;
            }

            let password_hash = crate::auth::hash_password(&parsed.password)
                .map_err(|e| ImportError::Parse(format!("password hashing failed: {e}")))?;
            batch.push(NewAccount {
                username: parsed.username,
                password_hash,
                variant: parsed.variant,
                is_admin: false,
            });
        }

        outcome.created = if batch.is_empty() {
            0
        } else {
            self.store.create_accounts(&batch).await?
        };

        info!(
            created = outcome.created,
            skipped_existing = outcome.skipped_existing,
            skipped_blank = outcome.skipped_blank,
            "Import finished"
        );
        Ok(outcome)
    }
}

struct ParsedRow {
    username: String,
    password: String,
    variant: AgentVariant,
}

/// Decode upload bytes, first encoding that succeeds wins:
/// UTF-8 (BOM stripped) → Windows-1252 → Latin-1 with replacement.
fn decode_text(bytes: &[u8]) -> Result<String, ImportError> {
    let without_bom = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);

    if let Ok(s) = std::str::from_utf8(without_bom) {
        return Ok(s.to_string());
    }

    if let Some(s) =
        encoding_rs::WINDOWS_1252.decode_without_bom_handling_and_without_replacement(without_bom)
    {
        return Ok(s.into_owned());
    }

    // Permissive last resort — every byte maps, possibly to U+FFFD.
    let (s, _, had_errors) = encoding_rs::WINDOWS_1252.decode(without_bom);
    if had_errors {
        warn!("Import file decoded with replacement characters");
    }
    Ok(s.into_owned())
}

/// Parse delimited rows, auto-detecting the delimiter from the header
/// line and discarding the header. Short rows are tolerated.
fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, ImportError> {
    let header = text.lines().next().unwrap_or("");
    let delimiter = if header.contains(';') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ImportError::Parse(e.to_string()))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }
    Ok(rows)
}

/// Map one row to provisioning input. Returns None for blank identifiers.
fn map_row(row: &[String], default_password: &str) -> Option<ParsedRow> {
    let offset = if row.len() >= OFFSET_LAYOUT_MIN_COLUMNS {
        OFFSET
    } else {
        0
    };

    let field = |i: usize| row.get(offset + i).map(|s| s.trim()).unwrap_or("");

    let username = field(0);
    if username.is_empty() {
        return None;
    }

    let password = match field(1) {
        "" => default_password,
        p => p,
    };

    Some(ParsedRow {
        username: username.to_string(),
        password: password.to_string(),
        variant: map_variant_label(field(2)),
    })
}

/// Resolve a free-form variant label via the ordered rule table.
pub fn map_variant_label(label: &str) -> AgentVariant {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return DEFAULT_VARIANT;
    }
    VARIANT_RULES
        .iter()
        .find(|(needle, _)| label.contains(needle))
        .map(|(_, variant)| *variant)
        .unwrap_or(DEFAULT_VARIANT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    async fn importer() -> (Arc<LibSqlBackend>, Importer) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let imp = Importer::new(store.clone(), "123456");
        (store, imp)
    }

    #[test]
    fn variant_label_rules() {
        assert_eq!(map_variant_label("AI Coach"), AgentVariant::Primary);
        assert_eq!(map_variant_label("primary"), AgentVariant::Primary);
        assert_eq!(map_variant_label("Basic Bot"), AgentVariant::Basic);
        assert_eq!(map_variant_label("GOFAI bot"), AgentVariant::Basic);
        assert_eq!(map_variant_label(""), AgentVariant::Basic);
        assert_eq!(map_variant_label("something else"), AgentVariant::Basic);
    }

    #[test]
    fn decode_utf8_with_bom() {
        let bytes = b"\xef\xbb\xbfid,pass,type\n";
        assert_eq!(decode_text(bytes).unwrap(), "id,pass,type\n");
    }

    #[test]
    fn decode_windows_1252_fallback() {
        // 0xE9 is é in Windows-1252 but invalid UTF-8.
        let bytes = b"caf\xe9,x,ai\n";
        let text = decode_text(bytes).unwrap();
        assert!(text.starts_with("café"));
    }

    #[test]
    fn semicolon_delimiter_detected() {
        let rows = parse_rows("id;pass;type\nalice;pw;ai\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], vec!["alice", "pw", "ai"]);
    }

    #[test]
    fn offset_layout_detected_by_width() {
        let row: Vec<String> = ["1", "Alice Johnson", "alice", "pw", "AI Coach"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let parsed = map_row(&row, "123456").unwrap();
        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.password, "pw");
        assert_eq!(parsed.variant, AgentVariant::Primary);
    }

    #[test]
    fn short_row_gets_defaults() {
        let row = vec!["bob".to_string()];
        let parsed = map_row(&row, "123456").unwrap();
        assert_eq!(parsed.password, "123456");
        assert_eq!(parsed.variant, AgentVariant::Basic);
    }

    #[tokio::test]
    async fn import_creates_accounts_with_defaults() {
        let (store, imp) = importer().await;
        let outcome = imp
            .run(b"id,pass,type\nalice,,AI Coach\nbob,secret,Basic Bot\n")
            .await
            .unwrap();
        assert_eq!(outcome.created, 2);

        let alice = store.get_account_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.variant, AgentVariant::Primary);
        assert!(crate::auth::verify_password("123456", &alice.password_hash));

        let bob = store.get_account_by_username("bob").await.unwrap().unwrap();
        assert_eq!(bob.variant, AgentVariant::Basic);
        assert!(crate::auth::verify_password("secret", &bob.password_hash));
    }

    #[tokio::test]
    async fn import_is_idempotent() {
        let (store, imp) = importer().await;
        let file = b"id,pass,type\nalice,,ai\nbob,,basic\ncarol,,gofai\n";

        let first = imp.run(file).await.unwrap();
        assert_eq!(first.created, 3);

        let second = imp.run(file).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped_existing, 3);

        assert_eq!(store.list_accounts().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn blank_identifiers_and_duplicates_in_file_skipped() {
        let (_store, imp) = importer().await;
        let outcome = imp
            .run(b"id,pass,type\n,,ai\nalice,,ai\nalice,,basic\n")
            .await
            .unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.skipped_blank, 1);
        assert_eq!(outcome.skipped_existing, 1);
    }

    #[tokio::test]
    async fn empty_file_creates_nothing() {
        let (_store, imp) = importer().await;
        let outcome = imp.run(b"id,pass,type\n").await.unwrap();
        assert_eq!(outcome.created, 0);
    }
}
