//! Shopping lists persisted as a local JSON document.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ListError;
use crate::models::receipt::ReferenceItemSet;

use super::{Fulfillment, ListSummary, ShoppingList};

/// One entry on a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub specification: String,
}

impl ListItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specification: String::new(),
        }
    }
}

/// A single shopping list: open items and recently completed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListData {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub purchase: Vec<ListItem>,
    #[serde(default)]
    pub recently: Vec<ListItem>,
}

impl ShoppingListData {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uuid: slug(&name),
            name,
            purchase: Vec::new(),
            recently: Vec::new(),
        }
    }

    fn position(items: &[ListItem], name: &str) -> Option<usize> {
        items.iter().position(|item| item.name == name)
    }

    fn complete(&mut self, name: &str) -> Result<Fulfillment, ListError> {
        if let Some(pos) = Self::position(&self.purchase, name) {
            let item = self.purchase.remove(pos);
            self.recently.push(item);
            return Ok(Fulfillment::Fulfilled);
        }
        if Self::position(&self.recently, name).is_some() {
            return Ok(Fulfillment::AlreadyFulfilled);
        }
        Err(self.not_found(name))
    }

    fn add(&mut self, name: &str, specification: &str) {
        if let Some(pos) = Self::position(&self.purchase, name) {
            self.purchase[pos].specification = specification.to_string();
            return;
        }
        if let Some(pos) = Self::position(&self.recently, name) {
            self.recently.remove(pos);
        }
        self.purchase.push(ListItem {
            name: name.to_string(),
            specification: specification.to_string(),
        });
    }

    fn remove(&mut self, name: &str) -> Result<(), ListError> {
        let before = self.purchase.len() + self.recently.len();
        self.purchase.retain(|item| item.name != name);
        self.recently.retain(|item| item.name != name);
        if self.purchase.len() + self.recently.len() == before {
            return Err(self.not_found(name));
        }
        Ok(())
    }

    fn not_found(&self, name: &str) -> ListError {
        ListError::NotFound {
            list: self.name.clone(),
            item: name.to_string(),
        }
    }
}

/// The on-disk document holding every list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDocument {
    #[serde(default)]
    pub lists: Vec<ShoppingListData>,
}

impl ListDocument {
    /// Find a list by uuid or name; `None` selects the first list.
    pub fn find(&self, list: Option<&str>) -> Result<&ShoppingListData, ListError> {
        let index = self.index_of(list)?;
        Ok(&self.lists[index])
    }

    fn index_of(&self, list: Option<&str>) -> Result<usize, ListError> {
        match list {
            None if self.lists.is_empty() => {
                Err(ListError::UnknownList("no shopping lists available".to_string()))
            }
            None => Ok(0),
            Some(id) => self
                .lists
                .iter()
                .position(|l| l.uuid == id || l.name == id)
                .ok_or_else(|| ListError::UnknownList(id.to_string())),
        }
    }
}

/// [`ShoppingList`] backed by a JSON file, or purely in memory.
///
/// Every mutation is written back to disk before the call returns.
#[derive(Debug)]
pub struct JsonShoppingList {
    path: Option<PathBuf>,
    document: Mutex<ListDocument>,
}

impl JsonShoppingList {
    /// Open an existing list file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ListError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let document: ListDocument = serde_json::from_str(&content)?;

        debug!(
            "Loaded {} shopping list(s) from {}",
            document.lists.len(),
            path.display()
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            document: Mutex::new(document),
        })
    }

    /// Create a new list file containing one empty list.
    pub fn create(path: impl AsRef<Path>, list_name: &str) -> Result<Self, ListError> {
        let store = Self {
            path: Some(path.as_ref().to_path_buf()),
            document: Mutex::new(ListDocument {
                lists: vec![ShoppingListData::new(list_name)],
            }),
        };
        store.persist(&store.lock())?;
        Ok(store)
    }

    /// A store that is never written to disk.
    pub fn in_memory(document: ListDocument) -> Self {
        Self {
            path: None,
            document: Mutex::new(document),
        }
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> ListDocument {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ListDocument> {
        self.document.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, document: &ListDocument) -> Result<(), ListError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, serde_json::to_string_pretty(document)?)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn update<T, F>(&self, list: Option<&str>, f: F) -> Result<T, ListError>
    where
        F: FnOnce(&mut ShoppingListData) -> Result<T, ListError>,
    {
        let mut document = self.lock();
        let index = document.index_of(list)?;

        let mut data = document.lists[index].clone();
        let value = f(&mut data)?;
        if data == document.lists[index] {
            return Ok(value);
        }

        // Memory only changes once the new state is on disk.
        let mut updated = document.clone();
        updated.lists[index] = data;
        self.persist(&updated)?;
        *document = updated;
        Ok(value)
    }
}

#[async_trait]
impl ShoppingList for JsonShoppingList {
    async fn lists(&self) -> Result<Vec<ListSummary>, ListError> {
        Ok(self
            .lock()
            .lists
            .iter()
            .map(|l| ListSummary {
                uuid: l.uuid.clone(),
                name: l.name.clone(),
                open_items: l.purchase.len(),
            })
            .collect())
    }

    async fn load_reference_items(&self, list: Option<&str>) -> Result<ReferenceItemSet, ListError> {
        let document = self.lock();
        let data = document.find(list)?;
        debug!("Loaded {} open items from list '{}'", data.purchase.len(), data.name);
        Ok(data.purchase.iter().map(|item| item.name.clone()).collect())
    }

    async fn mark_fulfilled(&self, list: Option<&str>, name: &str) -> Result<Fulfillment, ListError> {
        self.update(list, |data| data.complete(name))
    }

    async fn add_item(
        &self,
        list: Option<&str>,
        name: &str,
        specification: &str,
    ) -> Result<(), ListError> {
        self.update(list, |data| {
            data.add(name, specification);
            Ok(())
        })
    }

    async fn remove_item(&self, list: Option<&str>, name: &str) -> Result<(), ListError> {
        self.update(list, |data| data.remove(name))
    }
}

fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { "list".to_string() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::apply_mapping;
    use crate::models::receipt::CategorizedMapping;
    use pretty_assertions::assert_eq;

    fn document() -> ListDocument {
        let mut home = ShoppingListData::new("Zuhause");
        home.purchase = vec![ListItem::new("Milk"), ListItem::new("Kiwis"), ListItem::new("Bread")];
        home.recently = vec![ListItem::new("Butter")];
        let mut office = ShoppingListData::new("Office");
        office.purchase = vec![ListItem::new("Coffee")];
        ListDocument { lists: vec![home, office] }
    }

    #[tokio::test]
    async fn test_reference_items_default_to_first_list() {
        let store = JsonShoppingList::in_memory(document());
        let items = store.load_reference_items(None).await.unwrap();
        assert_eq!(items.iter().collect::<Vec<_>>(), vec!["Milk", "Kiwis", "Bread"]);

        let office = store.load_reference_items(Some("office")).await.unwrap();
        assert_eq!(office.iter().collect::<Vec<_>>(), vec!["Coffee"]);
    }

    #[tokio::test]
    async fn test_unknown_list() {
        let store = JsonShoppingList::in_memory(document());
        let err = store.load_reference_items(Some("Garage")).await.unwrap_err();
        assert!(matches!(err, ListError::UnknownList(ref id) if id == "Garage"));

        let empty = JsonShoppingList::in_memory(ListDocument::default());
        assert!(empty.load_reference_items(None).await.is_err());
    }

    #[tokio::test]
    async fn test_mark_fulfilled_is_idempotent() {
        let store = JsonShoppingList::in_memory(document());
        assert_eq!(store.mark_fulfilled(None, "Milk").await.unwrap(), Fulfillment::Fulfilled);
        assert_eq!(
            store.mark_fulfilled(None, "Milk").await.unwrap(),
            Fulfillment::AlreadyFulfilled
        );
        assert_eq!(
            store.mark_fulfilled(None, "Butter").await.unwrap(),
            Fulfillment::AlreadyFulfilled
        );

        let home = store.snapshot().lists[0].clone();
        assert_eq!(home.purchase, vec![ListItem::new("Kiwis"), ListItem::new("Bread")]);
        assert!(home.recently.contains(&ListItem::new("Milk")));
    }

    #[tokio::test]
    async fn test_mark_fulfilled_unknown_item() {
        let store = JsonShoppingList::in_memory(document());
        let err = store.mark_fulfilled(None, "Yogurt").await.unwrap_err();
        assert!(matches!(err, ListError::NotFound { ref item, .. } if item == "Yogurt"));
    }

    #[tokio::test]
    async fn test_add_reopens_and_remove_deletes() {
        let store = JsonShoppingList::in_memory(document());
        store.add_item(None, "Butter", "irische").await.unwrap();
        store.remove_item(None, "Kiwis").await.unwrap();

        let home = store.snapshot().lists[0].clone();
        assert!(home.recently.is_empty());
        assert_eq!(
            home.purchase.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["Milk", "Bread", "Butter"]
        );
        assert_eq!(home.purchase[2].specification, "irische");
        assert!(store.remove_item(None, "Kiwis").await.is_err());
    }

    #[tokio::test]
    async fn test_changes_persist_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");

        let store = JsonShoppingList::create(&path, "Zuhause").unwrap();
        store.add_item(None, "Milk", "").await.unwrap();
        store.add_item(None, "Bread", "").await.unwrap();
        store.mark_fulfilled(Some("zuhause"), "Milk").await.unwrap();

        let reopened = JsonShoppingList::open(&path).unwrap();
        let items = reopened.load_reference_items(None).await.unwrap();
        assert_eq!(items.iter().collect::<Vec<_>>(), vec!["Bread"]);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");

        let store = JsonShoppingList::create(&path, "Zuhause").unwrap();
        store.add_item(None, "Milk", "").await.unwrap();

        // A directory in the way of the temp file makes the write fail.
        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        let err = store.mark_fulfilled(None, "Milk").await.unwrap_err();
        assert!(matches!(err, ListError::Io(_)));
        assert!(store.add_item(None, "Bread", "").await.is_err());

        let in_memory = store.load_reference_items(None).await.unwrap();
        assert_eq!(in_memory.iter().collect::<Vec<_>>(), vec!["Milk"]);

        let on_disk = JsonShoppingList::open(&path).unwrap().load_reference_items(None).await.unwrap();
        assert_eq!(on_disk, in_memory);
    }

    #[tokio::test]
    async fn test_unchanged_list_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");

        let store = JsonShoppingList::create(&path, "Zuhause").unwrap();
        store.add_item(None, "Milk", "").await.unwrap();
        store.mark_fulfilled(None, "Milk").await.unwrap();

        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        assert_eq!(
            store.mark_fulfilled(None, "Milk").await.unwrap(),
            Fulfillment::AlreadyFulfilled
        );
        store.add_item(None, "Milk", "").await.unwrap_err();
    }

    #[tokio::test]
    async fn test_apply_mapping_reports_each_item_once() {
        let store = JsonShoppingList::in_memory(document());
        let mut mapping = CategorizedMapping::new();
        mapping.insert("Frischmilch 1L", "Milk");
        mapping.insert("H-Milch", "Milk");
        mapping.insert("Irische Butter", "Butter");
        mapping.insert("Joghurt", "Yogurt");

        let report = apply_mapping(&store, None, &mapping).await;

        assert_eq!(report.items.len(), 3);
        assert_eq!(report.items[0].receipts, vec!["Frischmilch 1L", "H-Milch"]);
        assert_eq!(report.fulfilled(), 1);
        assert_eq!(report.already_fulfilled(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Zuhause"), "zuhause");
        assert_eq!(slug(" Wochen Einkauf! "), "wochen-einkauf");
        assert_eq!(slug("!!"), "list");
    }
}
