//! Shared integration-test harness: a tempfile-backed SQLite database with
//! migrations applied, one pool shared across every repository adapter.

use std::sync::Arc;

use taskforge::infrastructure::database::{
    DatabaseConnection, EventRepositoryImpl, KnowledgeRepositoryImpl, LockRepositoryImpl,
    SessionRepositoryImpl, TaskRepositoryImpl,
};
use taskforge::infrastructure::vcs::FakeVcsAdapter;
use taskforge::services::{AgentTypeRegistry, EventBus, KnowledgeBase, ResourceRegistry};

pub struct TestDb {
    // Keeps the backing file alive for the database's lifetime.
    _dir: tempfile::TempDir,
    pub connection: DatabaseConnection,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("taskforge.db");
        let url = format!("sqlite:{}", path.display());
        let connection = DatabaseConnection::new(&url, 5).await.expect("connect");
        connection.migrate().await.expect("migrate");
        Self { _dir: dir, connection }
    }

    pub fn tasks(&self) -> Arc<TaskRepositoryImpl> {
        Arc::new(TaskRepositoryImpl::new(self.connection.pool().clone()))
    }

    pub fn sessions(&self) -> Arc<SessionRepositoryImpl> {
        Arc::new(SessionRepositoryImpl::new(self.connection.pool().clone()))
    }

    pub fn locks(&self) -> Arc<LockRepositoryImpl> {
        Arc::new(LockRepositoryImpl::new(self.connection.pool().clone()))
    }

    pub fn knowledge(&self) -> Arc<KnowledgeRepositoryImpl> {
        Arc::new(KnowledgeRepositoryImpl::new(self.connection.pool().clone()))
    }

    pub fn events(&self) -> Arc<EventRepositoryImpl> {
        Arc::new(EventRepositoryImpl::new(self.connection.pool().clone()))
    }
}

pub fn resource_registry(db: &TestDb) -> Arc<ResourceRegistry> {
    Arc::new(ResourceRegistry::new(db.locks()))
}

pub fn event_bus(db: &TestDb) -> Arc<EventBus> {
    Arc::new(EventBus::new(db.events()))
}

pub fn agent_type_registry() -> Arc<AgentTypeRegistry> {
    Arc::new(AgentTypeRegistry::with_defaults())
}

pub fn knowledge_base(db: &TestDb) -> KnowledgeBase {
    KnowledgeBase::new(db.knowledge(), Default::default())
}

pub fn fake_vcs() -> Arc<FakeVcsAdapter> {
    Arc::new(FakeVcsAdapter::new())
}
