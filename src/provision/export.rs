//! Transcript export — flattened, timestamp-ordered CSV of every
//! account's messages and extracted variables, for administrative
//! download.

use std::sync::Arc;

use crate::error::DatabaseError;
use crate::store::Database;

/// Build the export CSV. Header:
/// `timestamp,session_id,username,kind,name,content`.
pub async fn export_csv(store: &Arc<dyn Database>) -> Result<String, DatabaseError> {
    let rows = store.export_rows().await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["timestamp", "session_id", "username", "kind", "name", "content"])
        .map_err(|e| DatabaseError::Query(format!("export header: {e}")))?;

    for row in rows {
        writer
            .write_record([
                row.timestamp.to_rfc3339().as_str(),
                row.session_id.as_str(),
                row.username.as_str(),
                row.kind.as_str(),
                row.name.as_str(),
                row.content.as_str(),
            ])
            .map_err(|e| DatabaseError::Query(format!("export row: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DatabaseError::Query(format!("export flush: {e}")))?;
    String::from_utf8(bytes).map_err(|e| DatabaseError::Query(format!("export encoding: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;
    use crate::store::model::{AgentVariant, NewAccount, Role};

    #[tokio::test]
    async fn export_contains_messages_and_variables_in_order() {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let id = backend
            .create_account(&NewAccount {
                username: "alice".into(),
                password_hash: "h".into(),
                variant: AgentVariant::Primary,
                is_admin: false,
            })
            .await
            .unwrap();
        backend
            .insert_message(id, "s1", Role::User, "hello")
            .await
            .unwrap();
        backend
            .record_exchange(id, "s1", "hi", &[("score".into(), "5".into())])
            .await
            .unwrap();

        let store: Arc<dyn Database> = backend;
        let csv_text = export_csv(&store).await.unwrap();

        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,session_id,username,kind,name,content"
        );
        let body: Vec<&str> = lines.collect();
        assert_eq!(body.len(), 3);
        assert!(body.iter().any(|l| l.contains(",user,") && l.contains("hello")));
        assert!(body.iter().any(|l| l.contains(",agent,") && l.contains("hi")));
        assert!(body.iter().any(|l| l.contains(",variable,score,5")));
    }

    #[tokio::test]
    async fn empty_store_exports_header_only() {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let store: Arc<dyn Database> = backend;
        let csv_text = export_csv(&store).await.unwrap();
        assert_eq!(csv_text.lines().count(), 1);
    }
}
