//! Manage contexts.

use anyhow::Result;
use std::path::Path;

use crate::config::ContextStore;

/// List contexts, marking the current one.
pub async fn list(data_dir: &Path) -> Result<()> {
    let store = ContextStore::load(data_dir).await?;

    if store.contexts.is_empty() {
        println!("No contexts configured");
        return Ok(());
    }

    for (name, data) in &store.contexts {
        let marker = if *name == store.current_context { "*" } else { " " };
        if data.namespace.is_empty() {
            println!("{} {}  {}", marker, name, data.endpoint);
        } else {
            println!("{} {}  {} ({})", marker, name, data.endpoint, data.namespace);
        }
    }
    Ok(())
}

/// Switch the current context.
pub async fn use_context(data_dir: &Path, name: &str) -> Result<()> {
    let mut store = ContextStore::load(data_dir).await?;
    store.use_context(name)?;
    store.save(data_dir).await?;

    tracing::info!(context = name, "Current context changed");
    println!("Using context '{}'", name);
    Ok(())
}

/// Delete a context.
pub async fn delete(data_dir: &Path, name: &str) -> Result<()> {
    let mut store = ContextStore::load(data_dir).await?;
    store.delete(name)?;
    store.save(data_dir).await?;

    tracing::info!(context = name, "Context deleted");
    println!("Context '{}' deleted", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextData, ContextError};
    use tempfile::tempdir;

    async fn seed(data_dir: &Path) {
        let mut store = ContextStore::default();
        for name in ["minikube", "staging"] {
            store.contexts.insert(
                name.to_string(),
                ContextData {
                    endpoint: format!("https://{}.example.com", name),
                    namespace: String::new(),
                },
            );
        }
        store.current_context = "minikube".to_string();
        store.save(data_dir).await.unwrap();
    }

    #[tokio::test]
    async fn list_without_store() {
        let dir = tempdir().unwrap();
        assert!(list(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn list_with_contexts() {
        let dir = tempdir().unwrap();
        seed(dir.path()).await;
        assert!(list(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn delete_persists() {
        let dir = tempdir().unwrap();
        seed(dir.path()).await;

        delete(dir.path(), "staging").await.unwrap();

        let store = ContextStore::load(dir.path()).await.unwrap();
        assert_eq!(store.contexts.len(), 1);
        assert!(store.contexts.contains_key("minikube"));
    }

    #[tokio::test]
    async fn delete_current_leaves_store_untouched() {
        let dir = tempdir().unwrap();
        seed(dir.path()).await;

        let err = delete(dir.path(), "minikube").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ContextError>(),
            Some(ContextError::IsCurrent(_))
        ));
        let store = ContextStore::load(dir.path()).await.unwrap();
        assert_eq!(store.contexts.len(), 2);
    }

    #[tokio::test]
    async fn use_then_delete_previous() {
        let dir = tempdir().unwrap();
        seed(dir.path()).await;

        use_context(dir.path(), "staging").await.unwrap();
        delete(dir.path(), "minikube").await.unwrap();

        let store = ContextStore::load(dir.path()).await.unwrap();
        assert_eq!(store.current_context, "staging");
        assert_eq!(store.contexts.len(), 1);
    }
}
