//! Route table: registration and lookup.
//!
//! # Responsibilities
//! - Hold every `RouteSpec`, built once at startup
//! - Resolve (method, dispatch path, content type) to a route or a typed miss
//!
//! # Design Decisions
//! - Immutable after construction (shared via `Arc`, no locks)
//! - First match wins, in registration order
//! - Required backends are declared per route, never inferred from the path
//! - Misses distinguish unknown path (404), wrong method (405) and wrong
//!   content type (415)

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::backend::{BackendKind, BackendSet};
use crate::backend::client::EntryType;
use crate::routing::matcher::{ContentTypeMatch, PathPattern, PatternError};

/// Backends every route needs.
pub fn base_backends() -> BackendSet {
    BackendSet::of(&[
        BackendKind::Placement,
        BackendKind::MetadataIndex,
        BackendKind::AuthCache,
    ])
}

/// The authorization action a route is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// Only account ownership is checked.
    None,
    Fixed(&'static str),
    /// Chosen from the target entry's type. Objects, links and missing
    /// entries use `object`.
    ByEntryType {
        directory: &'static str,
        object: &'static str,
    },
}

impl AuthAction {
    pub fn resolve(&self, entry_type: Option<EntryType>) -> Option<&'static str> {
        match self {
            AuthAction::None => None,
            AuthAction::Fixed(action) => Some(action),
            AuthAction::ByEntryType { directory, object } => match entry_type {
                Some(EntryType::Directory) => Some(directory),
                _ => Some(object),
            },
        }
    }
}

/// Immutable description of one route.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub name: String,
    pub method: Method,
    pub pattern: PathPattern,
    pub content_type: ContentTypeMatch,
    pub auth_action: AuthAction,
    pub required_backends: BackendSet,
    /// Fetch the target entry's metadata before authorization.
    pub loads_metadata: bool,
    /// Callers without credentials are let through.
    pub anonymous: bool,
}

impl RouteSpec {
    pub fn new(
        name: impl Into<String>,
        method: Method,
        pattern: &str,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            name: name.into(),
            method,
            pattern: PathPattern::parse(pattern)?,
            content_type: ContentTypeMatch::Any,
            auth_action: AuthAction::None,
            required_backends: base_backends(),
            loads_metadata: false,
            anonymous: false,
        })
    }

    pub fn content_type(mut self, content_type: ContentTypeMatch) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn auth(mut self, action: &'static str) -> Self {
        self.auth_action = AuthAction::Fixed(action);
        self
    }

    pub fn auth_by_entry(mut self, directory: &'static str, object: &'static str) -> Self {
        self.auth_action = AuthAction::ByEntryType { directory, object };
        self
    }

    pub fn requires(mut self, kind: BackendKind) -> Self {
        self.required_backends = self.required_backends.with(kind);
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.loads_metadata = true;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteSpec>,
    pub params: HashMap<String, String>,
}

/// Why a lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMiss {
    NotFound,
    MethodNotAllowed { allowed: Vec<Method> },
    UnsupportedMediaType,
}

/// Ordered, immutable set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteSpec>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: RouteSpec) {
        self.routes.push(Arc::new(route));
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter().map(|r| r.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&RouteSpec> {
        self.routes().find(|r| r.name == name)
    }

    pub fn lookup(
        &self,
        method: &Method,
        path: &str,
        content_type: Option<&str>,
    ) -> Result<RouteMatch, RouteMiss> {
        let mut allowed: Vec<Method> = Vec::new();
        let mut method_matched = false;

        for route in &self.routes {
            let Some(params) = route.pattern.captures(path) else {
                continue;
            };
            if route.method != *method {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
                continue;
            }
            method_matched = true;
            if route.content_type.matches(content_type) {
                return Ok(RouteMatch {
                    route: Arc::clone(route),
                    params,
                });
            }
        }

        if method_matched {
            Err(RouteMiss::UnsupportedMediaType)
        } else if allowed.is_empty() {
            Err(RouteMiss::NotFound)
        } else {
            Err(RouteMiss::MethodNotAllowed { allowed })
        }
    }

    /// The gateway's route set.
    pub fn builtin() -> Result<Self, PatternError> {
        let mut table = Self::new();
        let job = |name: &str, method: Method, pattern: &str| {
            RouteSpec::new(name, method, pattern).map(|r| r.requires(BackendKind::JobExecution))
        };

        // Compute jobs
        table.push(job("CreateJob", Method::POST, "/:account/jobs")?);
        table.push(job("ListLiveJobs", Method::GET, "/:account/jobs/live")?);
        table.push(job("GetJobStatus", Method::GET, "/:account/jobs/:id/live/status")?.auth("getjob"));
        table.push(job("PostJobCancel", Method::POST, "/:account/jobs/:id/live/cancel")?.auth("managejob"));
        table.push(job("GetJobErrors", Method::GET, "/:account/jobs/:id/live/err")?.auth("getjob"));
        table.push(job("GetJobFailures", Method::GET, "/:account/jobs/:id/live/fail")?.auth("getjob"));
        table.push(job("PostJobInput", Method::POST, "/:account/jobs/:id/live/in")?.auth("managejob"));
        table.push(job("GetJobInput", Method::GET, "/:account/jobs/:id/live/in")?.auth("getjob"));
        table.push(job("PostJobInputDone", Method::POST, "/:account/jobs/:id/live/in/end")?.auth("managejob"));
        table.push(job("GetJobOutput", Method::GET, "/:account/jobs/:id/live/out")?.auth("getjob"));

        // Interactive sessions stream through the streaming backend only.
        table.push(
            RouteSpec::new("MedusaAttach", Method::GET, "/:account/medusa/attach/:id/:type")?
                .auth("mlogin")
                .requires(BackendKind::Streaming),
        );

        // Tokens
        table.push(
            RouteSpec::new("CreateToken", Method::POST, "/:account/tokens")?
                .requires(BackendKind::KeyDirectory),
        );

        table.push(RouteSpec::new("ListJobs", Method::GET, "/:account/jobs")?.with_metadata());

        // Root dir
        table.push(RouteSpec::new("GetRootDir", Method::GET, "/:account")?.auth("getdirectory"));
        table.push(RouteSpec::new("HeadRootDir", Method::HEAD, "/:account")?.auth("getdirectory"));
        table.push(RouteSpec::new("PutRootDir", Method::PUT, "/:account")?.auth("putdirectory"));
        table.push(RouteSpec::new("PostRootDir", Method::POST, "/:account")?);
        table.push(RouteSpec::new("DeleteRootDir", Method::DELETE, "/:account")?.auth("deletedirectory"));

        // Job storage lives under each job's own `stor` area.
        let areas = [
            ("stor", ""),
            ("public", "Public"),
            ("jobs/:id/stor", "Jobs"),
            ("reports", "Reports"),
        ];
        for (segment, label) in areas {
            let pattern = format!("/:account/{segment}/*path");
            let storage = |name: String, method: Method| {
                RouteSpec::new(name, method, &pattern).map(RouteSpec::with_metadata)
            };
            let public_read = segment == "public";

            table.push(
                storage(format!("Put{label}Directory"), Method::PUT)?
                    .content_type(ContentTypeMatch::exact("application/json", Some("directory")))
                    .auth("putdirectory"),
            );
            table.push(
                storage(format!("Put{label}Link"), Method::PUT)?
                    .content_type(ContentTypeMatch::exact("application/json", Some("link")))
                    .auth("putlink"),
            );
            table.push(storage(format!("Put{label}Object"), Method::PUT)?.auth("putobject"));
            table.push(storage(format!("Options{label}Storage"), Method::OPTIONS)?.anonymous());

            let get = storage(format!("Get{label}Storage"), Method::GET)?
                .auth_by_entry("getdirectory", "getobject");
            let head = storage(format!("Head{label}Storage"), Method::HEAD)?
                .auth_by_entry("getdirectory", "getobject");
            if public_read {
                table.push(get.anonymous());
                table.push(head.anonymous());
            } else {
                table.push(get);
                table.push(head);
            }
            table.push(
                storage(format!("Delete{label}Storage"), Method::DELETE)?
                    .auth_by_entry("deletedirectory", "deleteobject"),
            );
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::builtin().unwrap()
    }

    fn name(result: Result<RouteMatch, RouteMiss>) -> String {
        result.unwrap().route.name.clone()
    }

    #[test]
    fn storage_route_names() {
        let t = table();
        assert_eq!(name(t.lookup(&Method::GET, "/mark/stor/a.txt", None)), "GetStorage");
        assert_eq!(name(t.lookup(&Method::GET, "/mark/public", None)), "GetPublicStorage");
        assert_eq!(name(t.lookup(&Method::DELETE, "/mark/reports/x", None)), "DeleteReportsStorage");
        assert_eq!(name(t.lookup(&Method::GET, "/mark", None)), "GetRootDir");
    }

    #[test]
    fn put_selects_by_content_type() {
        let t = table();
        let dir = Some("application/json; type=directory");
        let link = Some("application/json; type=link");
        assert_eq!(name(t.lookup(&Method::PUT, "/mark/stor/d", dir)), "PutDirectory");
        assert_eq!(name(t.lookup(&Method::PUT, "/mark/stor/l", link)), "PutLink");
        assert_eq!(name(t.lookup(&Method::PUT, "/mark/stor/o", Some("text/plain"))), "PutObject");
        assert_eq!(name(t.lookup(&Method::PUT, "/mark/stor/o", None)), "PutObject");
    }

    #[test]
    fn jobs_collection_is_list_jobs_for_get_and_create_for_post() {
        let t = table();
        assert_eq!(name(t.lookup(&Method::GET, "/mark/jobs", None)), "ListJobs");
        assert_eq!(name(t.lookup(&Method::POST, "/mark/jobs", None)), "CreateJob");
        assert_eq!(name(t.lookup(&Method::GET, "/mark/jobs/live", None)), "ListLiveJobs");
    }

    #[test]
    fn job_storage_sits_under_the_job() {
        let t = table();
        assert_eq!(
            name(t.lookup(&Method::GET, "/mark/jobs/abc/stor/out.txt", None)),
            "GetJobsStorage"
        );
        assert_eq!(
            name(t.lookup(&Method::PUT, "/mark/jobs/abc/stor/in.txt", None)),
            "PutJobsObject"
        );
        assert_eq!(
            name(t.lookup(&Method::GET, "/mark/jobs/abc/live/status", None)),
            "GetJobStatus"
        );

        for method in [Method::PUT, Method::DELETE] {
            match t.lookup(&method, "/mark/jobs", None).unwrap_err() {
                RouteMiss::MethodNotAllowed { allowed } => {
                    assert!(allowed.contains(&Method::GET));
                    assert!(allowed.contains(&Method::POST));
                    assert!(!allowed.contains(&method));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            t.lookup(&Method::DELETE, "/mark/jobs/abc", None).unwrap_err(),
            RouteMiss::NotFound
        );
        assert_eq!(
            t.lookup(&Method::GET, "/mark/jobs/abc/live/bogus", None).unwrap_err(),
            RouteMiss::NotFound
        );
    }

    #[test]
    fn misses_are_typed() {
        let t = table();
        assert_eq!(t.lookup(&Method::GET, "/", None).unwrap_err(), RouteMiss::NotFound);
        match t.lookup(&Method::PATCH, "/mark", None).unwrap_err() {
            RouteMiss::MethodNotAllowed { allowed } => {
                assert!(allowed.contains(&Method::GET));
                assert!(allowed.contains(&Method::DELETE));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn exact_content_type_only_route_yields_415() {
        let mut t = RouteTable::new();
        t.push(
            RouteSpec::new("PutDir", Method::PUT, "/:account/d")
                .unwrap()
                .content_type(ContentTypeMatch::exact("application/json", Some("directory"))),
        );
        assert_eq!(
            t.lookup(&Method::PUT, "/mark/d", Some("text/plain")).unwrap_err(),
            RouteMiss::UnsupportedMediaType
        );
    }

    #[test]
    fn required_backends_are_declared() {
        let t = table();
        let attach = t.get("MedusaAttach").unwrap();
        assert!(attach.required_backends.contains(BackendKind::Streaming));
        assert!(!attach.required_backends.contains(BackendKind::JobExecution));

        let create = t.get("CreateJob").unwrap();
        assert!(create.required_backends.contains(BackendKind::JobExecution));
        assert!(!create.required_backends.contains(BackendKind::Streaming));

        let token = t.get("CreateToken").unwrap();
        assert!(token.required_backends.contains(BackendKind::KeyDirectory));

        let get = t.get("GetStorage").unwrap();
        assert_eq!(get.required_backends, base_backends());
    }

    #[test]
    fn auth_action_by_entry_type() {
        let t = table();
        let get = t.get("GetStorage").unwrap();
        assert_eq!(get.auth_action.resolve(Some(EntryType::Directory)), Some("getdirectory"));
        assert_eq!(get.auth_action.resolve(Some(EntryType::Object)), Some("getobject"));
        assert_eq!(get.auth_action.resolve(None), Some("getobject"));
        assert!(t.get("GetPublicStorage").unwrap().anonymous);
        assert!(!t.get("GetStorage").unwrap().anonymous);
    }
}
