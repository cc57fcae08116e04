//! Course -> modules -> content items, ordered for display and navigation.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::quiz;
use crate::store::Store;

#[derive(Serialize, Debug, Clone)]
pub struct ModuleNode {
    #[serde(flatten)]
    pub module: Module,
    pub items: Vec<ContentItem>,
}

#[derive(Serialize, Debug, Clone)]
pub struct CourseTree {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<ModuleNode>,
}

impl ContentItemRow {
    /// Decodes the stored payload into its typed form. A quiz payload that
    /// does not parse or breaks the quiz rules is a validation error.
    pub fn decode(self) -> Result<ContentItem> {
        let body = match self.kind {
            ContentKind::Video => ContentBody::Video(self.content),
            ContentKind::Document => ContentBody::Document(self.content),
            ContentKind::Image => ContentBody::Image(self.content),
            ContentKind::Quiz => {
                let parsed: Quiz = serde_json::from_str(&self.content).map_err(|e| {
                    Error::validation(format!("content item {}: bad quiz payload: {e}", self.id))
                })?;
                quiz::validate(&parsed)?;
                ContentBody::Quiz(parsed)
            }
        };
        Ok(ContentItem {
            id: self.id,
            module_id: self.module_id,
            duration: self.duration,
            order_index: self.order_index,
            body,
        })
    }
}

#[derive(Clone)]
pub struct HierarchyReader {
    store: Arc<dyn Store>,
}

impl HierarchyReader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn course_tree(&self, course_id: Uuid) -> Result<CourseTree> {
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or(Error::NotFound("course"))?;

        let mut modules = self.store.list_modules(course_id).await?;
        modules.sort_by_key(|m| m.order_index);

        let mut nodes = Vec::with_capacity(modules.len());
        for module in modules {
            let items = self.items(module.id).await?;
            nodes.push(ModuleNode { module, items });
        }
        Ok(CourseTree { course, modules: nodes })
    }

    pub async fn module(&self, module_id: Uuid) -> Result<ModuleNode> {
        let module = self
            .store
            .get_module(module_id)
            .await?
            .ok_or(Error::NotFound("module"))?;
        let items = self.items(module_id).await?;
        Ok(ModuleNode { module, items })
    }

    pub async fn content_item(&self, item_id: Uuid) -> Result<ContentItem> {
        self.store
            .get_content_item(item_id)
            .await?
            .ok_or(Error::NotFound("content item"))?
            .decode()
    }

    async fn items(&self, module_id: Uuid) -> Result<Vec<ContentItem>> {
        let mut rows = self.store.list_content_items(module_id).await?;
        rows.sort_by_key(|r| r.order_index);
        rows.into_iter().map(ContentItemRow::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn course(id: Uuid) -> Course {
        Course {
            id,
            title: "Rust basics".into(),
            description: String::new(),
            duration: 90,
            level: Level::Beginner,
            category: "programming".into(),
            instructor_id: None,
            created_at: Utc::now(),
        }
    }

    fn module(course_id: Uuid, title: &str, order_index: i32) -> Module {
        Module {
            id: Uuid::new_v4(),
            course_id,
            title: title.into(),
            duration: 10,
            order_index,
        }
    }

    fn row(module_id: Uuid, kind: ContentKind, content: &str, order_index: i32) -> ContentItemRow {
        ContentItemRow {
            id: Uuid::new_v4(),
            module_id,
            kind,
            content: content.into(),
            duration: 0,
            order_index,
        }
    }

    #[tokio::test]
    async fn modules_come_back_in_order_index_order() {
        let store = Arc::new(MemoryStore::new());
        let course_id = Uuid::new_v4();
        store.insert_course(&course(course_id)).await.unwrap();
        // B inserted before A
        let b = module(course_id, "B", 1);
        let a = module(course_id, "A", 0);
        store.insert_module(&b).await.unwrap();
        store.insert_module(&a).await.unwrap();

        let tree = HierarchyReader::new(store).course_tree(course_id).await.unwrap();
        let titles: Vec<_> = tree.modules.iter().map(|n| n.module.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
    }

    #[tokio::test]
    async fn items_are_ordered_and_typed() {
        let store = Arc::new(MemoryStore::new());
        let course_id = Uuid::new_v4();
        store.insert_course(&course(course_id)).await.unwrap();
        let m = module(course_id, "Intro", 0);
        store.insert_module(&m).await.unwrap();
        let quiz = r#"{"question":"2+2?","type":"single","options":[{"text":"4","isCorrect":true},{"text":"5","isCorrect":false}]}"#;
        store
            .sync_content_items(
                m.id,
                &[
                    row(m.id, ContentKind::Quiz, quiz, 2),
                    row(m.id, ContentKind::Video, "https://cdn/intro.mp4", 0),
                    row(m.id, ContentKind::Document, "read me", 1),
                ],
            )
            .await
            .unwrap();

        let node = HierarchyReader::new(store).module(m.id).await.unwrap();
        assert_eq!(node.items.len(), 3);
        assert!(matches!(node.items[0].body, ContentBody::Video(ref u) if u == "https://cdn/intro.mp4"));
        assert!(matches!(node.items[1].body, ContentBody::Document(_)));
        match &node.items[2].body {
            ContentBody::Quiz(q) => assert_eq!(q.mode, QuizMode::Single),
            other => panic!("expected quiz, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let reader = HierarchyReader::new(Arc::new(MemoryStore::new()));
        let err = reader.course_tree(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound("course")));
    }

    #[tokio::test]
    async fn malformed_quiz_fails_at_read() {
        let store = Arc::new(MemoryStore::new());
        let course_id = Uuid::new_v4();
        store.insert_course(&course(course_id)).await.unwrap();
        let m = module(course_id, "Intro", 0);
        store.insert_module(&m).await.unwrap();
        store
            .sync_content_items(m.id, &[row(m.id, ContentKind::Quiz, "{not json", 0)])
            .await
            .unwrap();

        let err = HierarchyReader::new(store).course_tree(course_id).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
