//! Admin-side writes to the content hierarchy.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hierarchy::ModuleNode;
use crate::models::*;
use crate::quiz;
use crate::store::Store;

#[derive(Clone)]
pub struct CourseAuthoring {
    store: Arc<dyn Store>,
}

fn validate_draft(draft: &ModuleDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(Error::validation("module title is empty"));
    }
    if draft.duration < 0 {
        return Err(Error::validation("module duration is negative"));
    }
    let mut ids = HashSet::new();
    if let Some(dup) = draft.items.iter().filter_map(|i| i.id).find(|id| !ids.insert(*id)) {
        return Err(Error::validation(format!("content item {dup} listed twice")));
    }
    let mut seen = HashSet::new();
    for (pos, item) in draft.items.iter().enumerate() {
        if !seen.insert(item.order_index) {
            return Err(Error::validation(format!(
                "content order index {} used twice",
                item.order_index
            )));
        }
        match &item.body {
            ContentBody::Video(url) if url.trim().is_empty() => {
                return Err(Error::validation(format!("item {pos}: video has no url")));
            }
            ContentBody::Quiz(q) => {
                quiz::validate(q)?;
            }
            _ => {}
        }
    }
    Ok(())
}

impl CourseAuthoring {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_course(&self, req: NewCourse) -> Result<Course> {
        if req.title.trim().is_empty() {
            return Err(Error::validation("course title is empty"));
        }
        if req.duration < 0 {
            return Err(Error::validation("course duration is negative"));
        }
        let course = Course {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            duration: req.duration,
            level: req.level,
            category: req.category,
            instructor_id: req.instructor_id,
            created_at: Utc::now(),
        };
        self.store.insert_course(&course).await?;
        tracing::info!(course_id = %course.id, "course created");
        Ok(course)
    }

    /// Writes a module and syncs its content items.
    ///
    /// Drafted items carrying an `id` update the existing item in place, so
    /// learners' attempts on it survive; items left out are deleted. Everything
    /// is validated before the first write. The module row and the item set
    /// are two separate writes; if the second fails the error is
    /// [`Error::PartiallyApplied`].
    pub async fn save_module(
        &self,
        course_id: Uuid,
        module_id: Option<Uuid>,
        draft: ModuleDraft,
    ) -> Result<ModuleNode> {
        validate_draft(&draft)?;
        if self.store.get_course(course_id).await?.is_none() {
            return Err(Error::NotFound("course"));
        }

        let id = module_id.unwrap_or_else(Uuid::new_v4);
        let current_items: HashSet<Uuid> = match module_id {
            Some(_) => {
                let existing = self.store.get_module(id).await?;
                if existing.map(|m| m.course_id) != Some(course_id) {
                    return Err(Error::NotFound("module"));
                }
                self.store
                    .list_content_items(id)
                    .await?
                    .into_iter()
                    .map(|r| r.id)
                    .collect()
            }
            None => HashSet::new(),
        };
        if let Some(stray) = draft
            .items
            .iter()
            .filter_map(|d| d.id)
            .find(|item_id| !current_items.contains(item_id))
        {
            return Err(Error::validation(format!(
                "content item {stray} is not part of this module"
            )));
        }

        let siblings = self.store.list_modules(course_id).await?;
        if siblings
            .iter()
            .any(|m| m.id != id && m.order_index == draft.order_index)
        {
            return Err(Error::validation(format!(
                "module order index {} already used in this course",
                draft.order_index
            )));
        }

        let module = Module {
            id,
            course_id,
            title: draft.title,
            duration: draft.duration,
            order_index: draft.order_index,
        };
        match module_id {
            Some(_) => {
                self.store.update_module(&module).await?;
            }
            None => self.store.insert_module(&module).await?,
        }

        let mut rows = Vec::with_capacity(draft.items.len());
        let mut items = Vec::with_capacity(draft.items.len());
        for d in draft.items {
            let content = d
                .body
                .encode()
                .map_err(|e| Error::validation(format!("cannot encode content: {e}")))?;
            let item = ContentItem {
                id: d.id.unwrap_or_else(Uuid::new_v4),
                module_id: id,
                duration: d.duration,
                order_index: d.order_index,
                body: d.body,
            };
            rows.push(ContentItemRow {
                id: item.id,
                module_id: id,
                kind: item.body.kind(),
                content,
                duration: item.duration,
                order_index: item.order_index,
            });
            items.push(item);
        }
        self.store
            .sync_content_items(id, &rows)
            .await
            .map_err(|source| {
                tracing::error!(module_id = %id, error = %source, "content items not written");
                Error::PartiallyApplied {
                    step: "module saved",
                    source,
                }
            })?;

        items.sort_by_key(|i| i.order_index);
        tracing::info!(module_id = %id, items = items.len(), "module saved");
        Ok(ModuleNode { module, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;

    use crate::error::StoreError;
    use crate::hierarchy::HierarchyReader;
    use crate::quiz::QuizGrader;
    use crate::store::{MemoryStore, StoreResult};

    /// Memory store whose content item writes always fail.
    #[derive(Default)]
    struct ItemWritesFail(MemoryStore);

    #[async_trait]
    impl Store for ItemWritesFail {
        async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
            self.0.get_course(id).await
        }
        async fn insert_course(&self, course: &Course) -> StoreResult<()> {
            self.0.insert_course(course).await
        }
        async fn list_modules(&self, course_id: Uuid) -> StoreResult<Vec<Module>> {
            self.0.list_modules(course_id).await
        }
        async fn get_module(&self, id: Uuid) -> StoreResult<Option<Module>> {
            self.0.get_module(id).await
        }
        async fn insert_module(&self, module: &Module) -> StoreResult<()> {
            self.0.insert_module(module).await
        }
        async fn update_module(&self, module: &Module) -> StoreResult<bool> {
            self.0.update_module(module).await
        }
        async fn list_content_items(&self, module_id: Uuid) -> StoreResult<Vec<ContentItemRow>> {
            self.0.list_content_items(module_id).await
        }
        async fn get_content_item(&self, id: Uuid) -> StoreResult<Option<ContentItemRow>> {
            self.0.get_content_item(id).await
        }
        async fn sync_content_items(
            &self,
            _module_id: Uuid,
            _items: &[ContentItemRow],
        ) -> StoreResult<()> {
            Err(StoreError::Other("connection reset".into()))
        }
        async fn get_enrollment(&self, u: Uuid, c: Uuid) -> StoreResult<Option<Enrollment>> {
            self.0.get_enrollment(u, c).await
        }
        async fn insert_enrollment(&self, e: &Enrollment) -> StoreResult<()> {
            self.0.insert_enrollment(e).await
        }
        async fn delete_enrollment(&self, u: Uuid, c: Uuid) -> StoreResult<bool> {
            self.0.delete_enrollment(u, c).await
        }
        async fn update_enrollment_progress(&self, u: Uuid, c: Uuid, p: i32) -> StoreResult<bool> {
            self.0.update_enrollment_progress(u, c, p).await
        }
        async fn list_enrollments_by_user(&self, u: Uuid) -> StoreResult<Vec<Enrollment>> {
            self.0.list_enrollments_by_user(u).await
        }
        async fn list_enrollments_by_course(&self, c: Uuid) -> StoreResult<Vec<Enrollment>> {
            self.0.list_enrollments_by_course(c).await
        }
        async fn get_module_progress(&self, u: Uuid, m: Uuid) -> StoreResult<Option<ModuleProgress>> {
            self.0.get_module_progress(u, m).await
        }
        async fn insert_module_progress(&self, p: &ModuleProgress) -> StoreResult<()> {
            self.0.insert_module_progress(p).await
        }
        async fn update_module_progress(&self, p: &ModuleProgress) -> StoreResult<bool> {
            self.0.update_module_progress(p).await
        }
        async fn list_module_progress(&self, u: Uuid, c: Uuid) -> StoreResult<Vec<ModuleProgress>> {
            self.0.list_module_progress(u, c).await
        }
        async fn record_quiz_attempt(
            &self,
            u: Uuid,
            i: Uuid,
            is_correct: bool,
            at: DateTime<Utc>,
        ) -> StoreResult<QuizAttempt> {
            self.0.record_quiz_attempt(u, i, is_correct, at).await
        }
        async fn list_quiz_attempts(&self, u: Uuid) -> StoreResult<Vec<QuizAttempt>> {
            self.0.list_quiz_attempts(u).await
        }
        async fn get_badge(&self, id: Uuid) -> StoreResult<Option<Badge>> {
            self.0.get_badge(id).await
        }
        async fn insert_badge(&self, b: &Badge) -> StoreResult<()> {
            self.0.insert_badge(b).await
        }
        async fn list_badges(&self) -> StoreResult<Vec<Badge>> {
            self.0.list_badges().await
        }
        async fn get_user_badge(&self, u: Uuid, b: Uuid) -> StoreResult<Option<UserBadge>> {
            self.0.get_user_badge(u, b).await
        }
        async fn insert_user_badge(&self, ub: &UserBadge) -> StoreResult<()> {
            self.0.insert_user_badge(ub).await
        }
        async fn delete_user_badge(&self, u: Uuid, b: Uuid) -> StoreResult<bool> {
            self.0.delete_user_badge(u, b).await
        }
        async fn list_badges_for_user(&self, u: Uuid) -> StoreResult<Vec<AwardedBadge>> {
            self.0.list_badges_for_user(u).await
        }
    }

    fn new_course() -> NewCourse {
        NewCourse {
            title: "Databases".into(),
            description: "SQL from scratch".into(),
            duration: 300,
            level: Level::Intermediate,
            category: "data".into(),
            instructor_id: None,
        }
    }

    fn draft(order_index: i32, items: Vec<ContentDraft>) -> ModuleDraft {
        ModuleDraft {
            title: format!("Module {order_index}"),
            duration: 15,
            order_index,
            items,
        }
    }

    fn item(order_index: i32, body: ContentBody) -> ContentDraft {
        ContentDraft {
            id: None,
            duration: 0,
            order_index,
            body,
        }
    }

    fn single_quiz() -> Quiz {
        Quiz {
            question: "Which one?".into(),
            mode: QuizMode::Single,
            options: vec![
                QuizOption { text: "a".into(), is_correct: true },
                QuizOption { text: "b".into(), is_correct: false },
            ],
        }
    }

    #[tokio::test]
    async fn saved_module_reads_back_through_the_hierarchy() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let authoring = CourseAuthoring::new(store.clone());
        let course = authoring.create_course(new_course()).await.unwrap();

        let saved = authoring
            .save_module(
                course.id,
                None,
                draft(
                    0,
                    vec![
                        item(1, ContentBody::Quiz(single_quiz())),
                        item(0, ContentBody::Document("intro".into())),
                    ],
                ),
            )
            .await
            .unwrap();
        assert_eq!(saved.items[0].order_index, 0);

        let tree = HierarchyReader::new(store).course_tree(course.id).await.unwrap();
        assert_eq!(tree.modules.len(), 1);
        assert_eq!(tree.modules[0].items, saved.items);
    }

    #[tokio::test]
    async fn update_replaces_items() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let authoring = CourseAuthoring::new(store.clone());
        let course = authoring.create_course(new_course()).await.unwrap();
        let first = authoring
            .save_module(course.id, None, draft(0, vec![item(0, ContentBody::Image("a.png".into()))]))
            .await
            .unwrap();

        let mut d = draft(0, vec![item(0, ContentBody::Document("x".into()))]);
        d.title = "Renamed".into();
        let second = authoring
            .save_module(course.id, Some(first.module.id), d)
            .await
            .unwrap();
        assert_eq!(second.module.id, first.module.id);

        let node = HierarchyReader::new(store).module(first.module.id).await.unwrap();
        assert_eq!(node.module.title, "Renamed");
        assert_eq!(node.items.len(), 1);
        assert!(matches!(node.items[0].body, ContentBody::Document(_)));
    }

    #[tokio::test]
    async fn duplicate_order_indexes_are_rejected_before_writing() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let authoring = CourseAuthoring::new(store.clone());
        let course = authoring.create_course(new_course()).await.unwrap();

        let dup_items = draft(
            0,
            vec![
                item(0, ContentBody::Document("a".into())),
                item(0, ContentBody::Document("b".into())),
            ],
        );
        assert!(matches!(
            authoring.save_module(course.id, None, dup_items).await,
            Err(Error::Validation(_))
        ));
        assert!(store.list_modules(course.id).await.unwrap().is_empty());

        authoring.save_module(course.id, None, draft(3, vec![])).await.unwrap();
        assert!(matches!(
            authoring.save_module(course.id, None, draft(3, vec![])).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn invalid_content_is_rejected() {
        let authoring = CourseAuthoring::new(Arc::new(MemoryStore::new()));
        let course = authoring.create_course(new_course()).await.unwrap();

        let mut bad_quiz = single_quiz();
        bad_quiz.options[1].is_correct = true;
        for body in [ContentBody::Quiz(bad_quiz), ContentBody::Video(String::new())] {
            let res = authoring
                .save_module(course.id, None, draft(0, vec![item(0, body)]))
                .await;
            assert!(matches!(res, Err(Error::Validation(_))));
        }
    }

    #[tokio::test]
    async fn module_of_another_course_is_not_found() {
        let authoring = CourseAuthoring::new(Arc::new(MemoryStore::new()));
        let a = authoring.create_course(new_course()).await.unwrap();
        let b = authoring.create_course(new_course()).await.unwrap();
        let m = authoring.save_module(a.id, None, draft(0, vec![])).await.unwrap();

        assert!(matches!(
            authoring.save_module(b.id, Some(m.module.id), draft(0, vec![])).await,
            Err(Error::NotFound("module"))
        ));
    }

    #[tokio::test]
    async fn blank_course_title_is_rejected() {
        let authoring = CourseAuthoring::new(Arc::new(MemoryStore::new()));
        let mut req = new_course();
        req.title = " ".into();
        assert!(matches!(authoring.create_course(req).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn resave_keeps_attempts_on_kept_items() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let authoring = CourseAuthoring::new(store.clone());
        let grader = QuizGrader::new(store.clone());
        let learner = Uuid::new_v4();
        let course = authoring.create_course(new_course()).await.unwrap();
        let saved = authoring
            .save_module(
                course.id,
                None,
                draft(
                    0,
                    vec![
                        item(0, ContentBody::Document("notes".into())),
                        item(1, ContentBody::Quiz(single_quiz())),
                    ],
                ),
            )
            .await
            .unwrap();
        let quiz_id = saved.items[1].id;
        grader.submit(learner, quiz_id, &[false, true]).await.unwrap();
        grader.submit(learner, quiz_id, &[false, true]).await.unwrap();

        // title-only edit, items sent back with their ids
        let mut edit = draft(
            0,
            saved
                .items
                .iter()
                .map(|i| ContentDraft {
                    id: Some(i.id),
                    duration: i.duration,
                    order_index: i.order_index,
                    body: i.body.clone(),
                })
                .collect(),
        );
        edit.title = "Renamed".into();
        let resaved = authoring
            .save_module(course.id, Some(saved.module.id), edit)
            .await
            .unwrap();
        assert_eq!(resaved.items[1].id, quiz_id);
        let attempts = grader.attempts_for_user(learner).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].attempts, 2);

        // dropping the quiz drops its attempts
        let keep_doc = ContentDraft {
            id: Some(saved.items[0].id),
            ..item(0, ContentBody::Document("notes v2".into()))
        };
        authoring
            .save_module(course.id, Some(saved.module.id), draft(0, vec![keep_doc]))
            .await
            .unwrap();
        assert!(grader.attempts_for_user(learner).await.unwrap().is_empty());
        let node = HierarchyReader::new(store).module(saved.module.id).await.unwrap();
        assert_eq!(node.items.len(), 1);
        assert_eq!(node.items[0].id, saved.items[0].id);
    }

    #[tokio::test]
    async fn item_ids_from_elsewhere_are_rejected() {
        let authoring = CourseAuthoring::new(Arc::new(MemoryStore::new()));
        let course = authoring.create_course(new_course()).await.unwrap();
        let a = authoring
            .save_module(course.id, None, draft(0, vec![item(0, ContentBody::Image("a.png".into()))]))
            .await
            .unwrap();
        let b = authoring.save_module(course.id, None, draft(1, vec![])).await.unwrap();

        let borrowed = ContentDraft {
            id: Some(a.items[0].id),
            ..item(0, ContentBody::Image("a.png".into()))
        };
        assert!(matches!(
            authoring.save_module(course.id, Some(b.module.id), draft(1, vec![borrowed])).await,
            Err(Error::Validation(_))
        ));

        let twice = |order_index| ContentDraft {
            id: Some(a.items[0].id),
            ..item(order_index, ContentBody::Image("a.png".into()))
        };
        assert!(matches!(
            authoring
                .save_module(course.id, Some(a.module.id), draft(0, vec![twice(0), twice(1)]))
                .await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn failed_item_write_reports_the_saved_module() {
        let store = Arc::new(ItemWritesFail::default());
        let authoring = CourseAuthoring::new(store.clone());
        let course = authoring.create_course(new_course()).await.unwrap();

        let res = authoring
            .save_module(
                course.id,
                None,
                draft(0, vec![item(0, ContentBody::Document("a".into()))]),
            )
            .await;
        assert!(matches!(
            res,
            Err(Error::PartiallyApplied { step: "module saved", .. })
        ));

        let modules = store.list_modules(course.id).await.unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].title, "Module 0");
        assert!(store.list_content_items(modules[0].id).await.unwrap().is_empty());
    }
}
