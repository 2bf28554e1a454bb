use crate::auth::Role;
use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("{0}")] Conflict(String),
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(
        &self,
        username: String,
        display_name: Option<String>,
        password_hash: Option<String>,
        role: Role,
    ) -> RepoResult<User>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<User>;
}

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn create_project(&self, new: NewProject, creator_id: Option<Id>) -> RepoResult<Project>;
    async fn get_project(&self, id: Id) -> RepoResult<Project>;
    async fn list_projects(
        &self,
        keyword: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> RepoResult<(Vec<Project>, i64)>;
    async fn update_project(&self, id: Id, upd: UpdateProject) -> RepoResult<Project>;
    /// Cascades to the project's interfaces (and their parameters) and
    /// dictionaries (and their values).
    async fn delete_project(&self, id: Id) -> RepoResult<Project>;
    async fn project_child_counts(&self, id: Id) -> RepoResult<(i64, i64)>;
    async fn add_project_attachment(&self, id: Id, att: Attachment) -> RepoResult<Project>;
    async fn remove_project_attachment(
        &self,
        id: Id,
        stored_filename: &str,
    ) -> RepoResult<(Project, Attachment)>;
}

#[async_trait]
pub trait InterfaceRepo: Send + Sync {
    async fn create_interface(
        &self,
        new: NewInterface,
        creator_id: Option<Id>,
    ) -> RepoResult<Interface>;
    async fn get_interface(&self, id: Id) -> RepoResult<Interface>;
    async fn get_interface_by_code(&self, code: &str) -> RepoResult<Interface>;
    async fn search_interfaces(&self, search: &InterfaceSearch) -> RepoResult<(Vec<Interface>, i64)>;
    async fn update_interface(&self, id: Id, upd: UpdateInterface) -> RepoResult<Interface>;
    async fn delete_interface(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait ParameterRepo: Send + Sync {
    async fn create_parameter(&self, interface_id: Id, new: NewParameter) -> RepoResult<Parameter>;
    async fn get_parameter(&self, id: Id) -> RepoResult<Parameter>;
    async fn list_parameters(
        &self,
        interface_id: Id,
        param_type: Option<ParamType>,
    ) -> RepoResult<Vec<Parameter>>;
    async fn update_parameter(&self, id: Id, upd: UpdateParameter) -> RepoResult<Parameter>;
    async fn delete_parameter(&self, id: Id) -> RepoResult<()>;
    /// Batch-import commit: appends the reviewed rows and renumbers every
    /// parameter of the interface sequentially by (order_index, id).
    async fn append_parameters(
        &self,
        interface_id: Id,
        new: Vec<NewParameter>,
    ) -> RepoResult<Vec<Parameter>>;
}

#[async_trait]
pub trait DictionaryRepo: Send + Sync {
    async fn create_dictionary(
        &self,
        new: NewDictionary,
        creator_id: Option<Id>,
    ) -> RepoResult<Dictionary>;
    async fn get_dictionary(&self, id: Id) -> RepoResult<Dictionary>;
    async fn get_dictionary_by_code(&self, code: &str) -> RepoResult<Dictionary>;
    async fn list_dictionaries(
        &self,
        project_id: Option<Id>,
        keyword: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> RepoResult<(Vec<Dictionary>, i64)>;
    async fn update_dictionary(&self, id: Id, upd: UpdateDictionary) -> RepoResult<Dictionary>;
    async fn delete_dictionary(&self, id: Id) -> RepoResult<()>;
    async fn add_dictionary_value(
        &self,
        dictionary_id: Id,
        new: NewDictionaryValue,
    ) -> RepoResult<DictionaryValue>;
    async fn delete_dictionary_value(&self, dictionary_id: Id, value_id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait DocumentRepo: Send + Sync {
    async fn create_document(&self, new: NewDocument, creator_id: Option<Id>) -> RepoResult<Document>;
    async fn get_document(&self, id: Id) -> RepoResult<Document>;
    async fn search_documents(&self, search: &DocumentSearch) -> RepoResult<(Vec<Document>, i64)>;
    async fn update_document(&self, id: Id, upd: UpdateDocument) -> RepoResult<Document>;
    async fn delete_document(&self, id: Id) -> RepoResult<Document>;
    async fn add_document_attachment(&self, id: Id, att: Attachment) -> RepoResult<Document>;
    /// Enforces the last-PDF rule for pdf-typed documents.
    async fn remove_document_attachment(
        &self,
        id: Id,
        stored_filename: &str,
    ) -> RepoResult<(Document, Attachment)>;
}

#[async_trait]
pub trait FaqRepo: Send + Sync {
    async fn create_faq(&self, new: NewFaq, creator_id: Option<Id>) -> RepoResult<Faq>;
    async fn get_faq(&self, id: Id) -> RepoResult<Faq>;
    async fn search_faqs(&self, search: &FaqSearch) -> RepoResult<(Vec<Faq>, i64)>;
    async fn update_faq(&self, id: Id, upd: UpdateFaq) -> RepoResult<Faq>;
    async fn delete_faq(&self, id: Id) -> RepoResult<Faq>;
    async fn add_faq_attachment(&self, id: Id, att: Attachment) -> RepoResult<Faq>;
    async fn remove_faq_attachment(
        &self,
        id: Id,
        stored_filename: &str,
    ) -> RepoResult<(Faq, Attachment)>;
}

pub trait Repo:
    UserRepo + ProjectRepo + InterfaceRepo + ParameterRepo + DictionaryRepo + DocumentRepo + FaqRepo
{
}

impl<T> Repo for T where
    T: UserRepo
        + ProjectRepo
        + InterfaceRepo
        + ParameterRepo
        + DictionaryRepo
        + DocumentRepo
        + FaqRepo
{
}

/// Rejects removing the last PDF from a list that must keep one.
fn guard_last_pdf(attachments: &[Attachment], idx: usize) -> RepoResult<()> {
    if attachments[idx].is_pdf() && attachments.iter().filter(|a| a.is_pdf()).count() <= 1 {
        return Err(RepoError::Conflict(
            "the last PDF attachment cannot be deleted".into(),
        ));
    }
    Ok(())
}

fn find_attachment(attachments: &[Attachment], stored_filename: &str) -> RepoResult<usize> {
    attachments
        .iter()
        .position(|a| a.stored_filename == stored_filename)
        .ok_or(RepoError::NotFound)
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        users: HashMap<Id, User>,
        projects: HashMap<Id, Project>,
        interfaces: HashMap<Id, Interface>, // stored with empty parameter lists
        parameters: HashMap<Id, Parameter>,
        dictionaries: HashMap<Id, Dictionary>, // stored with empty value lists
        dictionary_values: HashMap<Id, DictionaryValue>,
        documents: HashMap<Id, Document>,
        faqs: HashMap<Id, Faq>,
        next_id: Id,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("HISDOC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        fn snapshot_path() -> PathBuf {
            if std::env::var("HISDOC_DATA_DIR").is_ok() {
                let mut p = Self::data_dir();
                p.push("state.json");
                p
            } else {
                PathBuf::from(SNAPSHOT_PATH)
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("[inmem] loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!(
                            "[inmem] failed to parse snapshot '{}': {e}. Starting empty.",
                            path.display()
                        );
                        State::default()
                    }
                },
                Err(e) => {
                    log::info!("[inmem] no snapshot at '{}': {e}. Starting empty.", path.display());
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            if let Ok(s) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, s) {
                    log::error!("[inmem] failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            }
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }

        fn params_of(state: &State, interface_id: Id) -> Vec<Parameter> {
            let mut v: Vec<_> = state
                .parameters
                .values()
                .filter(|p| p.interface_id == interface_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| (a.order_index, a.id).cmp(&(b.order_index, b.id)));
            v
        }

        fn values_of(state: &State, dictionary_id: Id) -> Vec<DictionaryValue> {
            let mut v: Vec<_> = state
                .dictionary_values
                .values()
                .filter(|x| x.dictionary_id == dictionary_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| (a.order_index, a.id).cmp(&(b.order_index, b.id)));
            v
        }

        fn interface_with_params(state: &State, id: Id) -> RepoResult<Interface> {
            let mut iface = state.interfaces.get(&id).cloned().ok_or(RepoError::NotFound)?;
            iface.parameters = Self::params_of(state, id);
            Ok(iface)
        }

        fn dictionary_with_values(state: &State, id: Id) -> RepoResult<Dictionary> {
            let mut d = state.dictionaries.get(&id).cloned().ok_or(RepoError::NotFound)?;
            d.values = Self::values_of(state, id);
            Ok(d)
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self {
            Self::new()
        }
    }

    fn paginate<T>(mut items: Vec<T>, page: i64, page_size: i64) -> (Vec<T>, i64) {
        let total = items.len() as i64;
        let (page, page_size) = clamp_page(page, page_size);
        let start = ((page - 1) * page_size) as usize;
        let items = if start >= items.len() {
            Vec::new()
        } else {
            items.drain(start..).take(page_size as usize).collect()
        };
        (items, total)
    }

    fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
        haystack
            .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false)
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(
            &self,
            username: String,
            display_name: Option<String>,
            password_hash: Option<String>,
            role: Role,
        ) -> RepoResult<User> {
            let mut s = self.state.write().unwrap();
            if s.users.values().any(|u| u.username == username) {
                return Err(RepoError::Conflict(format!("username '{username}' is taken")));
            }
            let id = Self::next_id(&mut s);
            let user = User {
                id,
                username,
                display_name,
                password_hash,
                role,
                is_active: true,
                created_at: Utc::now(),
            };
            s.users.insert(id, user.clone());
            drop(s);
            self.persist();
            Ok(user)
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            let s = self.state.read().unwrap();
            s.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
            let s = self.state.read().unwrap();
            s.users
                .values()
                .find(|u| u.username == username)
                .cloned()
                .ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl ProjectRepo for InMemRepo {
        async fn create_project(
            &self,
            new: NewProject,
            creator_id: Option<Id>,
        ) -> RepoResult<Project> {
            let mut s = self.state.write().unwrap();
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let project = Project {
                id,
                name: new.name,
                manager: new.manager,
                contact_info: new.contact_info,
                description: new.description,
                documents: new.documents.unwrap_or_default(),
                attachments: Vec::new(),
                creator_id,
                version: 0,
                created_at: now,
                updated_at: now,
            };
            s.projects.insert(id, project.clone());
            drop(s);
            self.persist();
            Ok(project)
        }

        async fn get_project(&self, id: Id) -> RepoResult<Project> {
            let s = self.state.read().unwrap();
            s.projects.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_projects(
            &self,
            keyword: Option<&str>,
            page: i64,
            page_size: i64,
        ) -> RepoResult<(Vec<Project>, i64)> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .projects
                .values()
                .filter(|p| match keyword {
                    Some(k) if !k.is_empty() => {
                        contains_ci(Some(&p.name), k)
                            || contains_ci(Some(&p.manager), k)
                            || contains_ci(p.description.as_deref(), k)
                    }
                    _ => true,
                })
                .cloned()
                .collect();
            v.sort_by_key(|p| p.id);
            Ok(paginate(v, page, page_size))
        }

        async fn update_project(&self, id: Id, upd: UpdateProject) -> RepoResult<Project> {
            let mut s = self.state.write().unwrap();
            let project = s.projects.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(name) = upd.name {
                project.name = name;
            }
            if let Some(manager) = upd.manager {
                project.manager = manager;
            }
            if let Some(contact_info) = upd.contact_info {
                project.contact_info = contact_info;
            }
            if let Some(description) = upd.description {
                project.description = Some(description);
            }
            if let Some(documents) = upd.documents {
                project.documents = documents;
            }
            project.updated_at = Utc::now();
            let updated = project.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_project(&self, id: Id) -> RepoResult<Project> {
            let mut s = self.state.write().unwrap();
            let project = s.projects.remove(&id).ok_or(RepoError::NotFound)?;
            let iface_ids: Vec<Id> = s
                .interfaces
                .values()
                .filter(|i| i.project_id == id)
                .map(|i| i.id)
                .collect();
            for iface_id in &iface_ids {
                s.interfaces.remove(iface_id);
            }
            s.parameters.retain(|_, p| !iface_ids.contains(&p.interface_id));
            let dict_ids: Vec<Id> = s
                .dictionaries
                .values()
                .filter(|d| d.project_id == id)
                .map(|d| d.id)
                .collect();
            for dict_id in &dict_ids {
                s.dictionaries.remove(dict_id);
            }
            s.dictionary_values
                .retain(|_, v| !dict_ids.contains(&v.dictionary_id));
            drop(s);
            self.persist();
            Ok(project)
        }

        async fn project_child_counts(&self, id: Id) -> RepoResult<(i64, i64)> {
            let s = self.state.read().unwrap();
            if !s.projects.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            let interfaces = s.interfaces.values().filter(|i| i.project_id == id).count() as i64;
            let dictionaries = s.dictionaries.values().filter(|d| d.project_id == id).count() as i64;
            Ok((interfaces, dictionaries))
        }

        async fn add_project_attachment(&self, id: Id, att: Attachment) -> RepoResult<Project> {
            let mut s = self.state.write().unwrap();
            let project = s.projects.get_mut(&id).ok_or(RepoError::NotFound)?;
            project.attachments.push(att);
            project.version += 1;
            project.updated_at = Utc::now();
            let updated = project.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn remove_project_attachment(
            &self,
            id: Id,
            stored_filename: &str,
        ) -> RepoResult<(Project, Attachment)> {
            let mut s = self.state.write().unwrap();
            let project = s.projects.get_mut(&id).ok_or(RepoError::NotFound)?;
            let idx = find_attachment(&project.attachments, stored_filename)?;
            let removed = project.attachments.remove(idx);
            project.version += 1;
            project.updated_at = Utc::now();
            let updated = project.clone();
            drop(s);
            self.persist();
            Ok((updated, removed))
        }
    }

    #[async_trait]
    impl InterfaceRepo for InMemRepo {
        async fn create_interface(
            &self,
            new: NewInterface,
            creator_id: Option<Id>,
        ) -> RepoResult<Interface> {
            let mut s = self.state.write().unwrap();
            if !s.projects.contains_key(&new.project_id) {
                return Err(RepoError::NotFound);
            }
            if s.interfaces.values().any(|i| i.code == new.code) {
                return Err(RepoError::Conflict(format!(
                    "interface code '{}' already exists",
                    new.code
                )));
            }
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let iface = Interface {
                id,
                project_id: new.project_id,
                name: new.name,
                code: new.code,
                description: new.description,
                interface_type: new.interface_type,
                url: new.url,
                method: new.method,
                category: new.category,
                tags: new.tags,
                status: new.status.unwrap_or(InterfaceStatus::Active),
                input_example: new.input_example,
                output_example: new.output_example,
                view_definition: new.view_definition,
                notes: new.notes,
                creator_id,
                created_at: now,
                updated_at: now,
                parameters: Vec::new(),
            };
            s.interfaces.insert(id, iface);
            for p in new.parameters.unwrap_or_default() {
                let param_id = Self::next_id(&mut s);
                s.parameters.insert(
                    param_id,
                    Parameter {
                        id: param_id,
                        interface_id: id,
                        name: p.name,
                        field_name: p.field_name,
                        data_type: p.data_type,
                        param_type: p.param_type,
                        required: p.required,
                        default_value: p.default_value,
                        description: p.description,
                        example: p.example,
                        order_index: p.order_index,
                        dictionary_id: p.dictionary_id,
                        created_at: now,
                    },
                );
            }
            let created = Self::interface_with_params(&s, id)?;
            drop(s);
            self.persist();
            Ok(created)
        }

        async fn get_interface(&self, id: Id) -> RepoResult<Interface> {
            let s = self.state.read().unwrap();
            Self::interface_with_params(&s, id)
        }

        async fn get_interface_by_code(&self, code: &str) -> RepoResult<Interface> {
            let s = self.state.read().unwrap();
            let id = s
                .interfaces
                .values()
                .find(|i| i.code == code)
                .map(|i| i.id)
                .ok_or(RepoError::NotFound)?;
            Self::interface_with_params(&s, id)
        }

        async fn search_interfaces(
            &self,
            search: &InterfaceSearch,
        ) -> RepoResult<(Vec<Interface>, i64)> {
            let s = self.state.read().unwrap();
            let tag_list: Vec<String> = search
                .tags
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            let mut v: Vec<_> = s
                .interfaces
                .values()
                .filter(|i| {
                    if let Some(pid) = search.project_id {
                        if i.project_id != pid {
                            return false;
                        }
                    }
                    if let Some(k) = search.keyword.as_deref().filter(|k| !k.is_empty()) {
                        if !(contains_ci(Some(&i.name), k)
                            || contains_ci(Some(&i.code), k)
                            || contains_ci(i.description.as_deref(), k))
                        {
                            return false;
                        }
                    }
                    if let Some(t) = search.interface_type {
                        if i.interface_type != t {
                            return false;
                        }
                    }
                    if let Some(c) = search.category.as_deref().filter(|c| !c.is_empty()) {
                        if i.category.as_deref() != Some(c) {
                            return false;
                        }
                    }
                    if let Some(st) = search.status {
                        if i.status != st {
                            return false;
                        }
                    }
                    tag_list
                        .iter()
                        .all(|t| contains_ci(i.tags.as_deref(), t))
                })
                .cloned()
                .collect();
            v.sort_by_key(|i| i.id);
            Ok(paginate(v, search.page, search.page_size))
        }

        async fn update_interface(&self, id: Id, upd: UpdateInterface) -> RepoResult<Interface> {
            let mut s = self.state.write().unwrap();

            // uniqueness check before the mutable borrow
            if let Some(ref code) = upd.code {
                if s.interfaces.values().any(|i| i.code == *code && i.id != id) {
                    return Err(RepoError::Conflict(format!(
                        "interface code '{code}' already exists"
                    )));
                }
            }

            let iface = s.interfaces.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(name) = upd.name {
                iface.name = name;
            }
            if let Some(code) = upd.code {
                iface.code = code;
            }
            if let Some(description) = upd.description {
                iface.description = Some(description);
            }
            if let Some(t) = upd.interface_type {
                iface.interface_type = t;
            }
            if let Some(url) = upd.url {
                iface.url = Some(url);
            }
            if let Some(method) = upd.method {
                iface.method = Some(method);
            }
            if let Some(category) = upd.category {
                iface.category = Some(category);
            }
            if let Some(tags) = upd.tags {
                iface.tags = Some(tags);
            }
            if let Some(status) = upd.status {
                iface.status = status;
            }
            if let Some(v) = upd.input_example {
                iface.input_example = Some(v);
            }
            if let Some(v) = upd.output_example {
                iface.output_example = Some(v);
            }
            if let Some(v) = upd.view_definition {
                iface.view_definition = Some(v);
            }
            if let Some(v) = upd.notes {
                iface.notes = Some(v);
            }
            iface.updated_at = Utc::now();

            // a provided parameter list replaces all existing parameters
            if let Some(params) = upd.parameters {
                let now = Utc::now();
                s.parameters.retain(|_, p| p.interface_id != id);
                for p in params {
                    let param_id = Self::next_id(&mut s);
                    s.parameters.insert(
                        param_id,
                        Parameter {
                            id: param_id,
                            interface_id: id,
                            name: p.name,
                            field_name: p.field_name,
                            data_type: p.data_type,
                            param_type: p.param_type,
                            required: p.required,
                            default_value: p.default_value,
                            description: p.description,
                            example: p.example,
                            order_index: p.order_index,
                            dictionary_id: p.dictionary_id,
                            created_at: now,
                        },
                    );
                }
            }

            let updated = Self::interface_with_params(&s, id)?;
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_interface(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            if s.interfaces.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            s.parameters.retain(|_, p| p.interface_id != id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl ParameterRepo for InMemRepo {
        async fn create_parameter(
            &self,
            interface_id: Id,
            new: NewParameter,
        ) -> RepoResult<Parameter> {
            let mut s = self.state.write().unwrap();
            if !s.interfaces.contains_key(&interface_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let param = Parameter {
                id,
                interface_id,
                name: new.name,
                field_name: new.field_name,
                data_type: new.data_type,
                param_type: new.param_type,
                required: new.required,
                default_value: new.default_value,
                description: new.description,
                example: new.example,
                order_index: new.order_index,
                dictionary_id: new.dictionary_id,
                created_at: Utc::now(),
            };
            s.parameters.insert(id, param.clone());
            drop(s);
            self.persist();
            Ok(param)
        }

        async fn get_parameter(&self, id: Id) -> RepoResult<Parameter> {
            let s = self.state.read().unwrap();
            s.parameters.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_parameters(
            &self,
            interface_id: Id,
            param_type: Option<ParamType>,
        ) -> RepoResult<Vec<Parameter>> {
            let s = self.state.read().unwrap();
            if !s.interfaces.contains_key(&interface_id) {
                return Err(RepoError::NotFound);
            }
            let mut v = Self::params_of(&s, interface_id);
            if let Some(t) = param_type {
                v.retain(|p| p.param_type == t);
            }
            Ok(v)
        }

        async fn update_parameter(&self, id: Id, upd: UpdateParameter) -> RepoResult<Parameter> {
            let mut s = self.state.write().unwrap();
            let param = s.parameters.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(name) = upd.name {
                param.name = name;
            }
            if let Some(field_name) = upd.field_name {
                param.field_name = field_name;
            }
            if let Some(data_type) = upd.data_type {
                param.data_type = data_type;
            }
            if let Some(required) = upd.required {
                param.required = required;
            }
            if let Some(v) = upd.default_value {
                param.default_value = Some(v);
            }
            if let Some(v) = upd.description {
                param.description = Some(v);
            }
            if let Some(v) = upd.example {
                param.example = Some(v);
            }
            if let Some(v) = upd.order_index {
                param.order_index = v;
            }
            if let Some(v) = upd.dictionary_id {
                param.dictionary_id = Some(v);
            }
            let updated = param.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_parameter(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            if s.parameters.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            drop(s);
            self.persist();
            Ok(())
        }

        async fn append_parameters(
            &self,
            interface_id: Id,
            new: Vec<NewParameter>,
        ) -> RepoResult<Vec<Parameter>> {
            let mut s = self.state.write().unwrap();
            if !s.interfaces.contains_key(&interface_id) {
                return Err(RepoError::NotFound);
            }
            let now = Utc::now();
            for p in new {
                let param_id = Self::next_id(&mut s);
                s.parameters.insert(
                    param_id,
                    Parameter {
                        id: param_id,
                        interface_id,
                        name: p.name,
                        field_name: p.field_name,
                        data_type: p.data_type,
                        param_type: p.param_type,
                        required: p.required,
                        default_value: p.default_value,
                        description: p.description,
                        example: p.example,
                        order_index: p.order_index,
                        dictionary_id: p.dictionary_id,
                        created_at: now,
                    },
                );
            }
            // renumber the whole list sequentially
            let ordered: Vec<Id> = Self::params_of(&s, interface_id).iter().map(|p| p.id).collect();
            for (i, pid) in ordered.iter().enumerate() {
                if let Some(p) = s.parameters.get_mut(pid) {
                    p.order_index = i as i32;
                }
            }
            let result = Self::params_of(&s, interface_id);
            drop(s);
            self.persist();
            Ok(result)
        }
    }

    #[async_trait]
    impl DictionaryRepo for InMemRepo {
        async fn create_dictionary(
            &self,
            new: NewDictionary,
            creator_id: Option<Id>,
        ) -> RepoResult<Dictionary> {
            let mut s = self.state.write().unwrap();
            if !s.projects.contains_key(&new.project_id) {
                return Err(RepoError::NotFound);
            }
            if s.dictionaries.values().any(|d| d.code == new.code) {
                return Err(RepoError::Conflict(format!(
                    "dictionary code '{}' already exists",
                    new.code
                )));
            }
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let dict = Dictionary {
                id,
                project_id: new.project_id,
                name: new.name,
                code: new.code,
                description: new.description,
                interface_id: new.interface_id,
                creator_id,
                created_at: now,
                updated_at: now,
                values: Vec::new(),
            };
            s.dictionaries.insert(id, dict);
            for v in new.values.unwrap_or_default() {
                let value_id = Self::next_id(&mut s);
                s.dictionary_values.insert(
                    value_id,
                    DictionaryValue {
                        id: value_id,
                        dictionary_id: id,
                        key: v.key,
                        value: v.value,
                        description: v.description,
                        order_index: v.order_index,
                        created_at: now,
                    },
                );
            }
            let created = Self::dictionary_with_values(&s, id)?;
            drop(s);
            self.persist();
            Ok(created)
        }

        async fn get_dictionary(&self, id: Id) -> RepoResult<Dictionary> {
            let s = self.state.read().unwrap();
            Self::dictionary_with_values(&s, id)
        }

        async fn get_dictionary_by_code(&self, code: &str) -> RepoResult<Dictionary> {
            let s = self.state.read().unwrap();
            let id = s
                .dictionaries
                .values()
                .find(|d| d.code == code)
                .map(|d| d.id)
                .ok_or(RepoError::NotFound)?;
            Self::dictionary_with_values(&s, id)
        }

        async fn list_dictionaries(
            &self,
            project_id: Option<Id>,
            keyword: Option<&str>,
            page: i64,
            page_size: i64,
        ) -> RepoResult<(Vec<Dictionary>, i64)> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .dictionaries
                .values()
                .filter(|d| project_id.map(|pid| d.project_id == pid).unwrap_or(true))
                .filter(|d| match keyword {
                    Some(k) if !k.is_empty() => {
                        contains_ci(Some(&d.name), k)
                            || contains_ci(Some(&d.code), k)
                            || contains_ci(d.description.as_deref(), k)
                    }
                    _ => true,
                })
                .cloned()
                .collect();
            v.sort_by_key(|d| d.id);
            for d in &mut v {
                d.values = Self::values_of(&s, d.id);
            }
            Ok(paginate(v, page, page_size))
        }

        async fn update_dictionary(&self, id: Id, upd: UpdateDictionary) -> RepoResult<Dictionary> {
            let mut s = self.state.write().unwrap();
            if let Some(ref code) = upd.code {
                if s.dictionaries.values().any(|d| d.code == *code && d.id != id) {
                    return Err(RepoError::Conflict(format!(
                        "dictionary code '{code}' already exists"
                    )));
                }
            }
            let dict = s.dictionaries.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(name) = upd.name {
                dict.name = name;
            }
            if let Some(code) = upd.code {
                dict.code = code;
            }
            if let Some(description) = upd.description {
                dict.description = Some(description);
            }
            if let Some(interface_id) = upd.interface_id {
                dict.interface_id = Some(interface_id);
            }
            dict.updated_at = Utc::now();
            let updated = Self::dictionary_with_values(&s, id)?;
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_dictionary(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            if s.dictionaries.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            s.dictionary_values.retain(|_, v| v.dictionary_id != id);
            // deleting a dictionary only severs parameter references
            for p in s.parameters.values_mut() {
                if p.dictionary_id == Some(id) {
                    p.dictionary_id = None;
                }
            }
            drop(s);
            self.persist();
            Ok(())
        }

        async fn add_dictionary_value(
            &self,
            dictionary_id: Id,
            new: NewDictionaryValue,
        ) -> RepoResult<DictionaryValue> {
            let mut s = self.state.write().unwrap();
            if !s.dictionaries.contains_key(&dictionary_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let value = DictionaryValue {
                id,
                dictionary_id,
                key: new.key,
                value: new.value,
                description: new.description,
                order_index: new.order_index,
                created_at: Utc::now(),
            };
            s.dictionary_values.insert(id, value.clone());
            drop(s);
            self.persist();
            Ok(value)
        }

        async fn delete_dictionary_value(&self, dictionary_id: Id, value_id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            match s.dictionary_values.get(&value_id) {
                Some(v) if v.dictionary_id == dictionary_id => {
                    s.dictionary_values.remove(&value_id);
                }
                _ => return Err(RepoError::NotFound),
            }
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentRepo for InMemRepo {
        async fn create_document(
            &self,
            new: NewDocument,
            creator_id: Option<Id>,
        ) -> RepoResult<Document> {
            let mut s = self.state.write().unwrap();
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let doc = Document {
                id,
                title: new.title,
                description: new.description,
                region: new.region,
                person: new.person,
                document_type: new.document_type,
                attachments: Vec::new(),
                file_path: None,
                file_name: None,
                file_size: None,
                mime_type: None,
                creator_id,
                version: 0,
                created_at: now,
                updated_at: now,
            };
            s.documents.insert(id, doc.clone());
            drop(s);
            self.persist();
            Ok(doc)
        }

        async fn get_document(&self, id: Id) -> RepoResult<Document> {
            let s = self.state.read().unwrap();
            s.documents
                .get(&id)
                .cloned()
                .map(Document::synthesize_legacy_attachments)
                .ok_or(RepoError::NotFound)
        }

        async fn search_documents(
            &self,
            search: &DocumentSearch,
        ) -> RepoResult<(Vec<Document>, i64)> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .documents
                .values()
                .filter(|d| {
                    if let Some(k) = search.keyword.as_deref().filter(|k| !k.is_empty()) {
                        if !(contains_ci(Some(&d.title), k)
                            || contains_ci(d.description.as_deref(), k))
                        {
                            return false;
                        }
                    }
                    if let Some(t) = search.document_type {
                        if d.document_type != t {
                            return false;
                        }
                    }
                    if let Some(r) = search.region.as_deref().filter(|r| !r.is_empty()) {
                        if d.region.as_deref() != Some(r) {
                            return false;
                        }
                    }
                    if let Some(p) = search.person.as_deref().filter(|p| !p.is_empty()) {
                        if d.person.as_deref() != Some(p) {
                            return false;
                        }
                    }
                    true
                })
                .cloned()
                .map(Document::synthesize_legacy_attachments)
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at)); // latest first
            Ok(paginate(v, search.page, search.page_size))
        }

        async fn update_document(&self, id: Id, upd: UpdateDocument) -> RepoResult<Document> {
            let mut s = self.state.write().unwrap();
            let doc = s.documents.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title {
                doc.title = title;
            }
            if let Some(description) = upd.description {
                doc.description = Some(description);
            }
            if let Some(region) = upd.region {
                doc.region = Some(region);
            }
            if let Some(person) = upd.person {
                doc.person = Some(person);
            }
            doc.updated_at = Utc::now();
            let updated = doc.clone().synthesize_legacy_attachments();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_document(&self, id: Id) -> RepoResult<Document> {
            let mut s = self.state.write().unwrap();
            let doc = s
                .documents
                .remove(&id)
                .map(Document::synthesize_legacy_attachments)
                .ok_or(RepoError::NotFound)?;
            drop(s);
            self.persist();
            Ok(doc)
        }

        async fn add_document_attachment(&self, id: Id, att: Attachment) -> RepoResult<Document> {
            let mut s = self.state.write().unwrap();
            let doc = s.documents.get_mut(&id).ok_or(RepoError::NotFound)?;
            let mut updated = doc.clone().synthesize_legacy_attachments();
            updated.attachments.push(att);
            // the list is authoritative from now on
            updated.file_path = None;
            updated.file_name = None;
            updated.file_size = None;
            updated.mime_type = None;
            updated.version += 1;
            updated.updated_at = Utc::now();
            *doc = updated.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn remove_document_attachment(
            &self,
            id: Id,
            stored_filename: &str,
        ) -> RepoResult<(Document, Attachment)> {
            let mut s = self.state.write().unwrap();
            let doc = s.documents.get_mut(&id).ok_or(RepoError::NotFound)?;
            let mut updated = doc.clone().synthesize_legacy_attachments();
            let idx = find_attachment(&updated.attachments, stored_filename)?;
            if updated.document_type == DocumentKind::Pdf {
                guard_last_pdf(&updated.attachments, idx)?;
            }
            let removed = updated.attachments.remove(idx);
            updated.file_path = None;
            updated.file_name = None;
            updated.file_size = None;
            updated.mime_type = None;
            updated.version += 1;
            updated.updated_at = Utc::now();
            *doc = updated.clone();
            drop(s);
            self.persist();
            Ok((updated, removed))
        }
    }

    #[async_trait]
    impl FaqRepo for InMemRepo {
        async fn create_faq(&self, new: NewFaq, creator_id: Option<Id>) -> RepoResult<Faq> {
            let mut s = self.state.write().unwrap();
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let faq = Faq {
                id,
                title: new.title,
                description: new.description,
                module: new.module,
                person: new.person,
                document_type: new.document_type,
                content_type: new.content_type,
                rich_content: new.rich_content,
                attachments: Vec::new(),
                file_path: None,
                file_name: None,
                file_size: None,
                mime_type: None,
                creator_id,
                version: 0,
                created_at: now,
                updated_at: now,
            };
            s.faqs.insert(id, faq.clone());
            drop(s);
            self.persist();
            Ok(faq)
        }

        async fn get_faq(&self, id: Id) -> RepoResult<Faq> {
            let s = self.state.read().unwrap();
            s.faqs
                .get(&id)
                .cloned()
                .map(Faq::synthesize_legacy_attachments)
                .ok_or(RepoError::NotFound)
        }

        async fn search_faqs(&self, search: &FaqSearch) -> RepoResult<(Vec<Faq>, i64)> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .faqs
                .values()
                .filter(|f| {
                    if let Some(k) = search.keyword.as_deref().filter(|k| !k.is_empty()) {
                        if !(contains_ci(Some(&f.title), k)
                            || contains_ci(f.description.as_deref(), k))
                        {
                            return false;
                        }
                    }
                    if let Some(t) = search.document_type {
                        if f.document_type != t {
                            return false;
                        }
                    }
                    if let Some(m) = search.module.as_deref().filter(|m| !m.is_empty()) {
                        if f.module.as_deref() != Some(m) {
                            return false;
                        }
                    }
                    if let Some(p) = search.person.as_deref().filter(|p| !p.is_empty()) {
                        if f.person.as_deref() != Some(p) {
                            return false;
                        }
                    }
                    true
                })
                .cloned()
                .map(Faq::synthesize_legacy_attachments)
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(paginate(v, search.page, search.page_size))
        }

        async fn update_faq(&self, id: Id, upd: UpdateFaq) -> RepoResult<Faq> {
            let mut s = self.state.write().unwrap();
            let faq = s.faqs.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title {
                faq.title = title;
            }
            if let Some(description) = upd.description {
                faq.description = Some(description);
            }
            if let Some(module) = upd.module {
                faq.module = Some(module);
            }
            if let Some(person) = upd.person {
                faq.person = Some(person);
            }
            if let Some(rich_content) = upd.rich_content {
                faq.rich_content = Some(rich_content);
            }
            faq.updated_at = Utc::now();
            let updated = faq.clone().synthesize_legacy_attachments();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_faq(&self, id: Id) -> RepoResult<Faq> {
            let mut s = self.state.write().unwrap();
            let faq = s
                .faqs
                .remove(&id)
                .map(Faq::synthesize_legacy_attachments)
                .ok_or(RepoError::NotFound)?;
            drop(s);
            self.persist();
            Ok(faq)
        }

        async fn add_faq_attachment(&self, id: Id, att: Attachment) -> RepoResult<Faq> {
            let mut s = self.state.write().unwrap();
            let faq = s.faqs.get_mut(&id).ok_or(RepoError::NotFound)?;
            let mut updated = faq.clone().synthesize_legacy_attachments();
            updated.attachments.push(att);
            updated.file_path = None;
            updated.file_name = None;
            updated.file_size = None;
            updated.mime_type = None;
            updated.version += 1;
            updated.updated_at = Utc::now();
            *faq = updated.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn remove_faq_attachment(
            &self,
            id: Id,
            stored_filename: &str,
        ) -> RepoResult<(Faq, Attachment)> {
            let mut s = self.state.write().unwrap();
            let faq = s.faqs.get_mut(&id).ok_or(RepoError::NotFound)?;
            let mut updated = faq.clone().synthesize_legacy_attachments();
            let idx = find_attachment(&updated.attachments, stored_filename)?;
            // attachment-mode PDF FAQs must keep one file, like pdf documents
            if updated.content_type == ContentType::Attachment
                && updated.document_type == DocumentKind::Pdf
            {
                guard_last_pdf(&updated.attachments, idx)?;
            }
            let removed = updated.attachments.remove(idx);
            updated.file_path = None;
            updated.file_name = None;
            updated.file_size = None;
            updated.mime_type = None;
            updated.version += 1;
            updated.updated_at = Utc::now();
            *faq = updated.clone();
            drop(s);
            self.persist();
            Ok((updated, removed))
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::types::Json;
    use sqlx::{Pool, Postgres, QueryBuilder};

    // Bounded retries for the optimistic-concurrency loop on JSON attachment
    // columns; exhaustion surfaces as a conflict instead of a lost update.
    const CAS_ATTEMPTS: usize = 3;

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    fn db_err(e: sqlx::Error) -> RepoError {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Conflict("duplicate value for a unique field".into())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::NotFound,
            _ => RepoError::Internal(e.to_string()),
        }
    }

    const PROJECT_COLS: &str =
        "id, name, manager, contact_info, description, documents, attachments, creator_id, version, created_at, updated_at";
    const INTERFACE_COLS: &str = "id, project_id, name, code, description, interface_type, url, method, category, tags, status, input_example, output_example, view_definition, notes, creator_id, created_at, updated_at";
    const PARAMETER_COLS: &str = "id, interface_id, name, field_name, data_type, param_type, required, default_value, description, example, order_index, dictionary_id, created_at";
    const DICTIONARY_COLS: &str =
        "id, project_id, name, code, description, interface_id, creator_id, created_at, updated_at";
    const DOCUMENT_COLS: &str = "id, title, description, region, person, document_type, attachments, file_path, file_name, file_size, mime_type, creator_id, version, created_at, updated_at";
    const FAQ_COLS: &str = "id, title, description, module, person, document_type, content_type, rich_content, attachments, file_path, file_name, file_size, mime_type, creator_id, version, created_at, updated_at";

    impl PgRepo {
        async fn params_of(&self, interface_id: Id) -> RepoResult<Vec<Parameter>> {
            sqlx::query_as::<_, Parameter>(&format!(
                "SELECT {PARAMETER_COLS} FROM parameters WHERE interface_id = $1 ORDER BY order_index, id"
            ))
            .bind(interface_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn values_of(&self, dictionary_id: Id) -> RepoResult<Vec<DictionaryValue>> {
            sqlx::query_as::<_, DictionaryValue>(&format!(
                "SELECT {DICTIONARY_VALUE_COLS} FROM dictionary_values WHERE dictionary_id = $1 ORDER BY order_index, id"
            ))
            .bind(dictionary_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
        }
    }

    const DICTIONARY_VALUE_COLS: &str =
        "id, dictionary_id, key, value, description, order_index, created_at";

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(
            &self,
            username: String,
            display_name: Option<String>,
            password_hash: Option<String>,
            role: Role,
        ) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "INSERT INTO users (username, display_name, password_hash, role) VALUES ($1,$2,$3,$4)
                 RETURNING id, username, display_name, password_hash, role, is_active, created_at",
            )
            .bind(&username)
            .bind(&display_name)
            .bind(&password_hash)
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match db_err(e) {
                RepoError::Conflict(_) => {
                    RepoError::Conflict(format!("username '{username}' is taken"))
                }
                other => other,
            })
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "SELECT id, username, display_name, password_hash, role, is_active, created_at FROM users WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "SELECT id, username, display_name, password_hash, role, is_active, created_at FROM users WHERE username = $1",
            )
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }
    }

    #[async_trait]
    impl ProjectRepo for PgRepo {
        async fn create_project(
            &self,
            new: NewProject,
            creator_id: Option<Id>,
        ) -> RepoResult<Project> {
            sqlx::query_as::<_, Project>(&format!(
                "INSERT INTO projects (name, manager, contact_info, description, documents, creator_id)
                 VALUES ($1,$2,$3,$4,$5,$6) RETURNING {PROJECT_COLS}"
            ))
            .bind(&new.name)
            .bind(&new.manager)
            .bind(&new.contact_info)
            .bind(&new.description)
            .bind(Json(new.documents.unwrap_or_default()))
            .bind(creator_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn get_project(&self, id: Id) -> RepoResult<Project> {
            sqlx::query_as::<_, Project>(&format!(
                "SELECT {PROJECT_COLS} FROM projects WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn list_projects(
            &self,
            keyword: Option<&str>,
            page: i64,
            page_size: i64,
        ) -> RepoResult<(Vec<Project>, i64)> {
            let (page, page_size) = clamp_page(page, page_size);
            let pattern = keyword.filter(|k| !k.is_empty()).map(|k| format!("%{k}%"));
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM projects WHERE $1::text IS NULL
                 OR name ILIKE $1 OR manager ILIKE $1 OR description ILIKE $1",
            )
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            let items = sqlx::query_as::<_, Project>(&format!(
                "SELECT {PROJECT_COLS} FROM projects WHERE $1::text IS NULL
                 OR name ILIKE $1 OR manager ILIKE $1 OR description ILIKE $1
                 ORDER BY id LIMIT $2 OFFSET $3"
            ))
            .bind(&pattern)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            Ok((items, total))
        }

        async fn update_project(&self, id: Id, upd: UpdateProject) -> RepoResult<Project> {
            sqlx::query_as::<_, Project>(&format!(
                "UPDATE projects SET
                    name = COALESCE($2, name),
                    manager = COALESCE($3, manager),
                    contact_info = COALESCE($4, contact_info),
                    description = COALESCE($5, description),
                    documents = COALESCE($6, documents),
                    updated_at = now()
                 WHERE id = $1 RETURNING {PROJECT_COLS}"
            ))
            .bind(id)
            .bind(&upd.name)
            .bind(&upd.manager)
            .bind(&upd.contact_info)
            .bind(&upd.description)
            .bind(upd.documents.map(Json))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn delete_project(&self, id: Id) -> RepoResult<Project> {
            // children cascade via foreign keys
            sqlx::query_as::<_, Project>(&format!(
                "DELETE FROM projects WHERE id = $1 RETURNING {PROJECT_COLS}"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn project_child_counts(&self, id: Id) -> RepoResult<(i64, i64)> {
            let _ = self.get_project(id).await?;
            let interfaces: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM interfaces WHERE project_id = $1")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_err)?;
            let dictionaries: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM dictionaries WHERE project_id = $1")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_err)?;
            Ok((interfaces, dictionaries))
        }

        async fn add_project_attachment(&self, id: Id, att: Attachment) -> RepoResult<Project> {
            for _ in 0..CAS_ATTEMPTS {
                let p = self.get_project(id).await?;
                let mut attachments = p.attachments.clone();
                attachments.push(att.clone());
                let res = sqlx::query(
                    "UPDATE projects SET attachments = $2, version = version + 1, updated_at = now()
                     WHERE id = $1 AND version = $3",
                )
                .bind(id)
                .bind(Json(&attachments))
                .bind(p.version)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                if res.rows_affected() == 1 {
                    return self.get_project(id).await;
                }
            }
            Err(RepoError::Conflict(
                "attachment list changed concurrently; retry the upload".into(),
            ))
        }

        async fn remove_project_attachment(
            &self,
            id: Id,
            stored_filename: &str,
        ) -> RepoResult<(Project, Attachment)> {
            for _ in 0..CAS_ATTEMPTS {
                let p = self.get_project(id).await?;
                let mut attachments = p.attachments.clone();
                let idx = find_attachment(&attachments, stored_filename)?;
                let removed = attachments.remove(idx);
                let res = sqlx::query(
                    "UPDATE projects SET attachments = $2, version = version + 1, updated_at = now()
                     WHERE id = $1 AND version = $3",
                )
                .bind(id)
                .bind(Json(&attachments))
                .bind(p.version)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                if res.rows_affected() == 1 {
                    return Ok((self.get_project(id).await?, removed));
                }
            }
            Err(RepoError::Conflict(
                "attachment list changed concurrently; retry the delete".into(),
            ))
        }
    }

    #[async_trait]
    impl InterfaceRepo for PgRepo {
        async fn create_interface(
            &self,
            new: NewInterface,
            creator_id: Option<Id>,
        ) -> RepoResult<Interface> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let iface = sqlx::query_as::<_, Interface>(&format!(
                "INSERT INTO interfaces (project_id, name, code, description, interface_type, url, method, category, tags, status, input_example, output_example, view_definition, notes, creator_id)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15) RETURNING {INTERFACE_COLS}"
            ))
            .bind(new.project_id)
            .bind(&new.name)
            .bind(&new.code)
            .bind(&new.description)
            .bind(new.interface_type)
            .bind(&new.url)
            .bind(&new.method)
            .bind(&new.category)
            .bind(&new.tags)
            .bind(new.status.unwrap_or(InterfaceStatus::Active))
            .bind(&new.input_example)
            .bind(&new.output_example)
            .bind(&new.view_definition)
            .bind(&new.notes)
            .bind(creator_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match db_err(e) {
                RepoError::Conflict(_) => {
                    RepoError::Conflict(format!("interface code '{}' already exists", new.code))
                }
                other => other,
            })?;
            for p in new.parameters.unwrap_or_default() {
                sqlx::query(
                    "INSERT INTO parameters (interface_id, name, field_name, data_type, param_type, required, default_value, description, example, order_index, dictionary_id)
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
                )
                .bind(iface.id)
                .bind(&p.name)
                .bind(&p.field_name)
                .bind(&p.data_type)
                .bind(p.param_type)
                .bind(p.required)
                .bind(&p.default_value)
                .bind(&p.description)
                .bind(&p.example)
                .bind(p.order_index)
                .bind(p.dictionary_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
            tx.commit().await.map_err(db_err)?;
            self.get_interface(iface.id).await
        }

        async fn get_interface(&self, id: Id) -> RepoResult<Interface> {
            let mut iface = sqlx::query_as::<_, Interface>(&format!(
                "SELECT {INTERFACE_COLS} FROM interfaces WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            iface.parameters = self.params_of(id).await?;
            Ok(iface)
        }

        async fn get_interface_by_code(&self, code: &str) -> RepoResult<Interface> {
            let mut iface = sqlx::query_as::<_, Interface>(&format!(
                "SELECT {INTERFACE_COLS} FROM interfaces WHERE code = $1"
            ))
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            iface.parameters = self.params_of(iface.id).await?;
            Ok(iface)
        }

        async fn search_interfaces(
            &self,
            search: &InterfaceSearch,
        ) -> RepoResult<(Vec<Interface>, i64)> {
            let (page, page_size) = clamp_page(search.page, search.page_size);

            fn apply_filters<'a>(
                qb: &mut QueryBuilder<'a, Postgres>,
                search: &'a InterfaceSearch,
            ) {
                qb.push(" WHERE TRUE");
                if let Some(pid) = search.project_id {
                    qb.push(" AND project_id = ").push_bind(pid);
                }
                if let Some(k) = search.keyword.as_deref().filter(|k| !k.is_empty()) {
                    let pattern = format!("%{k}%");
                    qb.push(" AND (name ILIKE ")
                        .push_bind(pattern.clone())
                        .push(" OR code ILIKE ")
                        .push_bind(pattern.clone())
                        .push(" OR description ILIKE ")
                        .push_bind(pattern)
                        .push(")");
                }
                if let Some(t) = search.interface_type {
                    qb.push(" AND interface_type = ").push_bind(t);
                }
                if let Some(c) = search.category.as_deref().filter(|c| !c.is_empty()) {
                    qb.push(" AND category = ").push_bind(c);
                }
                if let Some(st) = search.status {
                    qb.push(" AND status = ").push_bind(st);
                }
                if let Some(tags) = search.tags.as_deref() {
                    for tag in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        qb.push(" AND tags ILIKE ").push_bind(format!("%{tag}%"));
                    }
                }
            }

            let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM interfaces");
            apply_filters(&mut count_qb, search);
            let total: i64 = count_qb
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

            let mut qb =
                QueryBuilder::new(format!("SELECT {INTERFACE_COLS} FROM interfaces"));
            apply_filters(&mut qb, search);
            qb.push(" ORDER BY id LIMIT ")
                .push_bind(page_size)
                .push(" OFFSET ")
                .push_bind((page - 1) * page_size);
            let items = qb
                .build_query_as::<Interface>()
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            Ok((items, total))
        }

        async fn update_interface(&self, id: Id, upd: UpdateInterface) -> RepoResult<Interface> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let code = upd.code.clone();
            sqlx::query(
                "UPDATE interfaces SET
                    name = COALESCE($2, name),
                    code = COALESCE($3, code),
                    description = COALESCE($4, description),
                    interface_type = COALESCE($5, interface_type),
                    url = COALESCE($6, url),
                    method = COALESCE($7, method),
                    category = COALESCE($8, category),
                    tags = COALESCE($9, tags),
                    status = COALESCE($10, status),
                    input_example = COALESCE($11, input_example),
                    output_example = COALESCE($12, output_example),
                    view_definition = COALESCE($13, view_definition),
                    notes = COALESCE($14, notes),
                    updated_at = now()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(&upd.name)
            .bind(&upd.code)
            .bind(&upd.description)
            .bind(upd.interface_type)
            .bind(&upd.url)
            .bind(&upd.method)
            .bind(&upd.category)
            .bind(&upd.tags)
            .bind(upd.status)
            .bind(&upd.input_example)
            .bind(&upd.output_example)
            .bind(&upd.view_definition)
            .bind(&upd.notes)
            .execute(&mut *tx)
            .await
            .map_err(|e| match db_err(e) {
                RepoError::Conflict(_) => RepoError::Conflict(format!(
                    "interface code '{}' already exists",
                    code.as_deref().unwrap_or_default()
                )),
                other => other,
            })?;
            if let Some(params) = upd.parameters {
                sqlx::query("DELETE FROM parameters WHERE interface_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                for p in params {
                    sqlx::query(
                        "INSERT INTO parameters (interface_id, name, field_name, data_type, param_type, required, default_value, description, example, order_index, dictionary_id)
                         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
                    )
                    .bind(id)
                    .bind(&p.name)
                    .bind(&p.field_name)
                    .bind(&p.data_type)
                    .bind(p.param_type)
                    .bind(p.required)
                    .bind(&p.default_value)
                    .bind(&p.description)
                    .bind(&p.example)
                    .bind(p.order_index)
                    .bind(p.dictionary_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
            }
            tx.commit().await.map_err(db_err)?;
            self.get_interface(id).await
        }

        async fn delete_interface(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM interfaces WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ParameterRepo for PgRepo {
        async fn create_parameter(
            &self,
            interface_id: Id,
            new: NewParameter,
        ) -> RepoResult<Parameter> {
            sqlx::query_as::<_, Parameter>(&format!(
                "INSERT INTO parameters (interface_id, name, field_name, data_type, param_type, required, default_value, description, example, order_index, dictionary_id)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11) RETURNING {PARAMETER_COLS}"
            ))
            .bind(interface_id)
            .bind(&new.name)
            .bind(&new.field_name)
            .bind(&new.data_type)
            .bind(new.param_type)
            .bind(new.required)
            .bind(&new.default_value)
            .bind(&new.description)
            .bind(&new.example)
            .bind(new.order_index)
            .bind(new.dictionary_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn get_parameter(&self, id: Id) -> RepoResult<Parameter> {
            sqlx::query_as::<_, Parameter>(&format!(
                "SELECT {PARAMETER_COLS} FROM parameters WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn list_parameters(
            &self,
            interface_id: Id,
            param_type: Option<ParamType>,
        ) -> RepoResult<Vec<Parameter>> {
            // existence check keeps 404 semantics for unknown interfaces
            sqlx::query_scalar::<_, i64>("SELECT id FROM interfaces WHERE id = $1")
                .bind(interface_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
            sqlx::query_as::<_, Parameter>(&format!(
                "SELECT {PARAMETER_COLS} FROM parameters WHERE interface_id = $1
                 AND ($2::param_type IS NULL OR param_type = $2)
                 ORDER BY order_index, id"
            ))
            .bind(interface_id)
            .bind(param_type)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn update_parameter(&self, id: Id, upd: UpdateParameter) -> RepoResult<Parameter> {
            sqlx::query_as::<_, Parameter>(&format!(
                "UPDATE parameters SET
                    name = COALESCE($2, name),
                    field_name = COALESCE($3, field_name),
                    data_type = COALESCE($4, data_type),
                    required = COALESCE($5, required),
                    default_value = COALESCE($6, default_value),
                    description = COALESCE($7, description),
                    example = COALESCE($8, example),
                    order_index = COALESCE($9, order_index),
                    dictionary_id = COALESCE($10, dictionary_id)
                 WHERE id = $1 RETURNING {PARAMETER_COLS}"
            ))
            .bind(id)
            .bind(&upd.name)
            .bind(&upd.field_name)
            .bind(&upd.data_type)
            .bind(upd.required)
            .bind(&upd.default_value)
            .bind(&upd.description)
            .bind(&upd.example)
            .bind(upd.order_index)
            .bind(upd.dictionary_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn delete_parameter(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM parameters WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn append_parameters(
            &self,
            interface_id: Id,
            new: Vec<NewParameter>,
        ) -> RepoResult<Vec<Parameter>> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            sqlx::query_scalar::<_, i64>("SELECT id FROM interfaces WHERE id = $1")
                .bind(interface_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
            for p in new {
                sqlx::query(
                    "INSERT INTO parameters (interface_id, name, field_name, data_type, param_type, required, default_value, description, example, order_index, dictionary_id)
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
                )
                .bind(interface_id)
                .bind(&p.name)
                .bind(&p.field_name)
                .bind(&p.data_type)
                .bind(p.param_type)
                .bind(p.required)
                .bind(&p.default_value)
                .bind(&p.description)
                .bind(&p.example)
                .bind(p.order_index)
                .bind(p.dictionary_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
            // renumber the full list sequentially
            sqlx::query(
                "UPDATE parameters p SET order_index = n.rn - 1
                 FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY order_index, id) AS rn
                       FROM parameters WHERE interface_id = $1) n
                 WHERE p.id = n.id",
            )
            .bind(interface_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            tx.commit().await.map_err(db_err)?;
            self.params_of(interface_id).await
        }
    }

    #[async_trait]
    impl DictionaryRepo for PgRepo {
        async fn create_dictionary(
            &self,
            new: NewDictionary,
            creator_id: Option<Id>,
        ) -> RepoResult<Dictionary> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let dict = sqlx::query_as::<_, Dictionary>(&format!(
                "INSERT INTO dictionaries (project_id, name, code, description, interface_id, creator_id)
                 VALUES ($1,$2,$3,$4,$5,$6) RETURNING {DICTIONARY_COLS}"
            ))
            .bind(new.project_id)
            .bind(&new.name)
            .bind(&new.code)
            .bind(&new.description)
            .bind(new.interface_id)
            .bind(creator_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match db_err(e) {
                RepoError::Conflict(_) => {
                    RepoError::Conflict(format!("dictionary code '{}' already exists", new.code))
                }
                other => other,
            })?;
            for v in new.values.unwrap_or_default() {
                sqlx::query(
                    "INSERT INTO dictionary_values (dictionary_id, key, value, description, order_index)
                     VALUES ($1,$2,$3,$4,$5)",
                )
                .bind(dict.id)
                .bind(&v.key)
                .bind(&v.value)
                .bind(&v.description)
                .bind(v.order_index)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
            tx.commit().await.map_err(db_err)?;
            self.get_dictionary(dict.id).await
        }

        async fn get_dictionary(&self, id: Id) -> RepoResult<Dictionary> {
            let mut dict = sqlx::query_as::<_, Dictionary>(&format!(
                "SELECT {DICTIONARY_COLS} FROM dictionaries WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            dict.values = self.values_of(id).await?;
            Ok(dict)
        }

        async fn get_dictionary_by_code(&self, code: &str) -> RepoResult<Dictionary> {
            let mut dict = sqlx::query_as::<_, Dictionary>(&format!(
                "SELECT {DICTIONARY_COLS} FROM dictionaries WHERE code = $1"
            ))
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            dict.values = self.values_of(dict.id).await?;
            Ok(dict)
        }

        async fn list_dictionaries(
            &self,
            project_id: Option<Id>,
            keyword: Option<&str>,
            page: i64,
            page_size: i64,
        ) -> RepoResult<(Vec<Dictionary>, i64)> {
            let (page, page_size) = clamp_page(page, page_size);
            let pattern = keyword.filter(|k| !k.is_empty()).map(|k| format!("%{k}%"));
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM dictionaries
                 WHERE ($1::bigint IS NULL OR project_id = $1)
                 AND ($2::text IS NULL OR name ILIKE $2 OR code ILIKE $2 OR description ILIKE $2)",
            )
            .bind(project_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            let mut items = sqlx::query_as::<_, Dictionary>(&format!(
                "SELECT {DICTIONARY_COLS} FROM dictionaries
                 WHERE ($1::bigint IS NULL OR project_id = $1)
                 AND ($2::text IS NULL OR name ILIKE $2 OR code ILIKE $2 OR description ILIKE $2)
                 ORDER BY id LIMIT $3 OFFSET $4"
            ))
            .bind(project_id)
            .bind(&pattern)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            for d in &mut items {
                d.values = self.values_of(d.id).await?;
            }
            Ok((items, total))
        }

        async fn update_dictionary(&self, id: Id, upd: UpdateDictionary) -> RepoResult<Dictionary> {
            let code = upd.code.clone();
            sqlx::query(
                "UPDATE dictionaries SET
                    name = COALESCE($2, name),
                    code = COALESCE($3, code),
                    description = COALESCE($4, description),
                    interface_id = COALESCE($5, interface_id),
                    updated_at = now()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(&upd.name)
            .bind(&upd.code)
            .bind(&upd.description)
            .bind(upd.interface_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match db_err(e) {
                RepoError::Conflict(_) => RepoError::Conflict(format!(
                    "dictionary code '{}' already exists",
                    code.as_deref().unwrap_or_default()
                )),
                other => other,
            })?;
            self.get_dictionary(id).await
        }

        async fn delete_dictionary(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM dictionaries WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn add_dictionary_value(
            &self,
            dictionary_id: Id,
            new: NewDictionaryValue,
        ) -> RepoResult<DictionaryValue> {
            sqlx::query_as::<_, DictionaryValue>(&format!(
                "INSERT INTO dictionary_values (dictionary_id, key, value, description, order_index)
                 VALUES ($1,$2,$3,$4,$5) RETURNING {DICTIONARY_VALUE_COLS}"
            ))
            .bind(dictionary_id)
            .bind(&new.key)
            .bind(&new.value)
            .bind(&new.description)
            .bind(new.order_index)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn delete_dictionary_value(&self, dictionary_id: Id, value_id: Id) -> RepoResult<()> {
            let res =
                sqlx::query("DELETE FROM dictionary_values WHERE id = $1 AND dictionary_id = $2")
                    .bind(value_id)
                    .bind(dictionary_id)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentRepo for PgRepo {
        async fn create_document(
            &self,
            new: NewDocument,
            creator_id: Option<Id>,
        ) -> RepoResult<Document> {
            sqlx::query_as::<_, Document>(&format!(
                "INSERT INTO documents (title, description, region, person, document_type, creator_id)
                 VALUES ($1,$2,$3,$4,$5,$6) RETURNING {DOCUMENT_COLS}"
            ))
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.region)
            .bind(&new.person)
            .bind(new.document_type)
            .bind(creator_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn get_document(&self, id: Id) -> RepoResult<Document> {
            sqlx::query_as::<_, Document>(&format!(
                "SELECT {DOCUMENT_COLS} FROM documents WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
            .map(Document::synthesize_legacy_attachments)
        }

        async fn search_documents(
            &self,
            search: &DocumentSearch,
        ) -> RepoResult<(Vec<Document>, i64)> {
            let (page, page_size) = clamp_page(search.page, search.page_size);
            let pattern = search
                .keyword
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(|k| format!("%{k}%"));
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM documents
                 WHERE ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)
                 AND ($2::document_kind IS NULL OR document_type = $2)
                 AND ($3::text IS NULL OR region = $3)
                 AND ($4::text IS NULL OR person = $4)",
            )
            .bind(&pattern)
            .bind(search.document_type)
            .bind(&search.region)
            .bind(&search.person)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            let items = sqlx::query_as::<_, Document>(&format!(
                "SELECT {DOCUMENT_COLS} FROM documents
                 WHERE ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)
                 AND ($2::document_kind IS NULL OR document_type = $2)
                 AND ($3::text IS NULL OR region = $3)
                 AND ($4::text IS NULL OR person = $4)
                 ORDER BY created_at DESC LIMIT $5 OFFSET $6"
            ))
            .bind(&pattern)
            .bind(search.document_type)
            .bind(&search.region)
            .bind(&search.person)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            Ok((
                items
                    .into_iter()
                    .map(Document::synthesize_legacy_attachments)
                    .collect(),
                total,
            ))
        }

        async fn update_document(&self, id: Id, upd: UpdateDocument) -> RepoResult<Document> {
            sqlx::query_as::<_, Document>(&format!(
                "UPDATE documents SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    region = COALESCE($4, region),
                    person = COALESCE($5, person),
                    updated_at = now()
                 WHERE id = $1 RETURNING {DOCUMENT_COLS}"
            ))
            .bind(id)
            .bind(&upd.title)
            .bind(&upd.description)
            .bind(&upd.region)
            .bind(&upd.person)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
            .map(Document::synthesize_legacy_attachments)
        }

        async fn delete_document(&self, id: Id) -> RepoResult<Document> {
            sqlx::query_as::<_, Document>(&format!(
                "DELETE FROM documents WHERE id = $1 RETURNING {DOCUMENT_COLS}"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
            .map(Document::synthesize_legacy_attachments)
        }

        async fn add_document_attachment(&self, id: Id, att: Attachment) -> RepoResult<Document> {
            for _ in 0..CAS_ATTEMPTS {
                let doc = self.get_document(id).await?;
                let mut attachments = doc.attachments.clone();
                attachments.push(att.clone());
                let res = sqlx::query(
                    "UPDATE documents SET attachments = $2, file_path = NULL, file_name = NULL,
                     file_size = NULL, mime_type = NULL, version = version + 1, updated_at = now()
                     WHERE id = $1 AND version = $3",
                )
                .bind(id)
                .bind(Json(&attachments))
                .bind(doc.version)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                if res.rows_affected() == 1 {
                    return self.get_document(id).await;
                }
            }
            Err(RepoError::Conflict(
                "attachment list changed concurrently; retry the upload".into(),
            ))
        }

        async fn remove_document_attachment(
            &self,
            id: Id,
            stored_filename: &str,
        ) -> RepoResult<(Document, Attachment)> {
            for _ in 0..CAS_ATTEMPTS {
                let doc = self.get_document(id).await?;
                let mut attachments = doc.attachments.clone();
                let idx = find_attachment(&attachments, stored_filename)?;
                if doc.document_type == DocumentKind::Pdf {
                    guard_last_pdf(&attachments, idx)?;
                }
                let removed = attachments.remove(idx);
                let res = sqlx::query(
                    "UPDATE documents SET attachments = $2, file_path = NULL, file_name = NULL,
                     file_size = NULL, mime_type = NULL, version = version + 1, updated_at = now()
                     WHERE id = $1 AND version = $3",
                )
                .bind(id)
                .bind(Json(&attachments))
                .bind(doc.version)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                if res.rows_affected() == 1 {
                    return Ok((self.get_document(id).await?, removed));
                }
            }
            Err(RepoError::Conflict(
                "attachment list changed concurrently; retry the delete".into(),
            ))
        }
    }

    #[async_trait]
    impl FaqRepo for PgRepo {
        async fn create_faq(&self, new: NewFaq, creator_id: Option<Id>) -> RepoResult<Faq> {
            sqlx::query_as::<_, Faq>(&format!(
                "INSERT INTO faqs (title, description, module, person, document_type, content_type, rich_content, creator_id)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8) RETURNING {FAQ_COLS}"
            ))
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.module)
            .bind(&new.person)
            .bind(new.document_type)
            .bind(new.content_type)
            .bind(&new.rich_content)
            .bind(creator_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
        }

        async fn get_faq(&self, id: Id) -> RepoResult<Faq> {
            sqlx::query_as::<_, Faq>(&format!("SELECT {FAQ_COLS} FROM faqs WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)
                .map(Faq::synthesize_legacy_attachments)
        }

        async fn search_faqs(&self, search: &FaqSearch) -> RepoResult<(Vec<Faq>, i64)> {
            let (page, page_size) = clamp_page(search.page, search.page_size);
            let pattern = search
                .keyword
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(|k| format!("%{k}%"));
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM faqs
                 WHERE ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)
                 AND ($2::document_kind IS NULL OR document_type = $2)
                 AND ($3::text IS NULL OR module = $3)
                 AND ($4::text IS NULL OR person = $4)",
            )
            .bind(&pattern)
            .bind(search.document_type)
            .bind(&search.module)
            .bind(&search.person)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            let items = sqlx::query_as::<_, Faq>(&format!(
                "SELECT {FAQ_COLS} FROM faqs
                 WHERE ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)
                 AND ($2::document_kind IS NULL OR document_type = $2)
                 AND ($3::text IS NULL OR module = $3)
                 AND ($4::text IS NULL OR person = $4)
                 ORDER BY created_at DESC LIMIT $5 OFFSET $6"
            ))
            .bind(&pattern)
            .bind(search.document_type)
            .bind(&search.module)
            .bind(&search.person)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            Ok((
                items
                    .into_iter()
                    .map(Faq::synthesize_legacy_attachments)
                    .collect(),
                total,
            ))
        }

        async fn update_faq(&self, id: Id, upd: UpdateFaq) -> RepoResult<Faq> {
            sqlx::query_as::<_, Faq>(&format!(
                "UPDATE faqs SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    module = COALESCE($4, module),
                    person = COALESCE($5, person),
                    rich_content = COALESCE($6, rich_content),
                    updated_at = now()
                 WHERE id = $1 RETURNING {FAQ_COLS}"
            ))
            .bind(id)
            .bind(&upd.title)
            .bind(&upd.description)
            .bind(&upd.module)
            .bind(&upd.person)
            .bind(&upd.rich_content)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
            .map(Faq::synthesize_legacy_attachments)
        }

        async fn delete_faq(&self, id: Id) -> RepoResult<Faq> {
            sqlx::query_as::<_, Faq>(&format!(
                "DELETE FROM faqs WHERE id = $1 RETURNING {FAQ_COLS}"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
            .map(Faq::synthesize_legacy_attachments)
        }

        async fn add_faq_attachment(&self, id: Id, att: Attachment) -> RepoResult<Faq> {
            for _ in 0..CAS_ATTEMPTS {
                let faq = self.get_faq(id).await?;
                let mut attachments = faq.attachments.clone();
                attachments.push(att.clone());
                let res = sqlx::query(
                    "UPDATE faqs SET attachments = $2, file_path = NULL, file_name = NULL,
                     file_size = NULL, mime_type = NULL, version = version + 1, updated_at = now()
                     WHERE id = $1 AND version = $3",
                )
                .bind(id)
                .bind(Json(&attachments))
                .bind(faq.version)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                if res.rows_affected() == 1 {
                    return self.get_faq(id).await;
                }
            }
            Err(RepoError::Conflict(
                "attachment list changed concurrently; retry the upload".into(),
            ))
        }

        async fn remove_faq_attachment(
            &self,
            id: Id,
            stored_filename: &str,
        ) -> RepoResult<(Faq, Attachment)> {
            for _ in 0..CAS_ATTEMPTS {
                let faq = self.get_faq(id).await?;
                let mut attachments = faq.attachments.clone();
                let idx = find_attachment(&attachments, stored_filename)?;
                if faq.content_type == ContentType::Attachment
                    && faq.document_type == DocumentKind::Pdf
                {
                    guard_last_pdf(&attachments, idx)?;
                }
                let removed = attachments.remove(idx);
                let res = sqlx::query(
                    "UPDATE faqs SET attachments = $2, file_path = NULL, file_name = NULL,
                     file_size = NULL, mime_type = NULL, version = version + 1, updated_at = now()
                     WHERE id = $1 AND version = $3",
                )
                .bind(id)
                .bind(Json(&attachments))
                .bind(faq.version)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                if res.rows_affected() == 1 {
                    return Ok((self.get_faq(id).await?, removed));
                }
            }
            Err(RepoError::Conflict(
                "attachment list changed concurrently; retry the delete".into(),
            ))
        }
    }
}
