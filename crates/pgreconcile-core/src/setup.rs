//! The Setup: the desired-object registry, the dependency checker, the
//! graph builder, the statement generator, and the dispatcher.
//!
//! Grounded on `pg_objects/setup.py`.

use crate::connection::ConnectionManager;
use crate::error::{ReconcileError, Result};
use crate::graph::Graph;
use crate::objects::database::Database;
use crate::objects::role::{Group, User};
use crate::objects::{resolve_role_key, DependencyRef, EmitCtx, ManagedObject, Node, ObjectKey, Registry};
use crate::observed::ObservedState;
use crate::statement::{Database as Routing, Statement};

/// The registry of desired objects plus the connection this run reconciles
/// against. Mirrors `Setup.__init__`: the implicit `public` group and the
/// master user are pre-registered so other objects can depend on them
/// without declaring them.
pub struct Setup {
    objects: Registry,
    connection_manager: ConnectionManager,
}

impl Setup {
    pub fn new(connection_manager: ConnectionManager) -> Self {
        let mut setup = Self {
            objects: Registry::new(),
            connection_manager,
        };
        for obj in setup.implicit_objects() {
            // Implicit objects have no dependencies, so registration cannot fail.
            setup.register(obj).expect("implicit objects always register");
        }
        setup
    }

    fn implicit_objects(&self) -> Vec<ManagedObject> {
        vec![
            ManagedObject::Group(Group { name: "public".to_string(), present: true }),
            ManagedObject::User(User {
                name: self.master_user().to_string(),
                present: true,
                password: None,
                groups: Vec::new(),
                inherit: true,
                databases: Vec::new(),
            }),
        ]
    }

    pub fn master_user(&self) -> &str {
        self.connection_manager.master_username()
    }

    pub fn master_database(&self) -> &str {
        self.connection_manager.master_database()
    }

    fn ctx(&self) -> EmitCtx<'_> {
        EmitCtx {
            master_user: self.master_user(),
            master_database: self.master_database(),
        }
    }

    /// Names of every registered `Database` object, regardless of its
    /// `present` flag — matches `Setup.managed_databases`.
    pub fn managed_databases(&self) -> Vec<String> {
        self.objects
            .values()
            .filter_map(|node| match node {
                Node::Managed(ManagedObject::Database(d)) => Some(d.name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.objects.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Registers a desired object, checking that every dependency it names
    /// is already registered and, if the object is `present`, that every
    /// dependency is too. Grounded on `Setup.register`.
    pub fn register(&mut self, obj: ManagedObject) -> Result<()> {
        let key = obj.key();
        if self.objects.contains_key(&key) {
            return Err(ReconcileError::DuplicateRegistration { key });
        }

        for dep in obj.dependencies() {
            let dep_key = self.resolve_dependency(&dep)?;
            let dep_node = self.objects.get(&dep_key).ok_or_else(|| ReconcileError::MissingDependency {
                object: key.clone(),
                dependency: dep_key.clone(),
            })?;
            if obj.present() && !dep_node.present() {
                return Err(ReconcileError::AbsentDependency { object: key.clone(), dependency: dep_key });
            }
        }

        self.objects.insert(key, Node::Managed(obj));
        Ok(())
    }

    fn resolve_dependency(&self, dep: &DependencyRef) -> Result<ObjectKey> {
        match dep {
            DependencyRef::Key(k) => Ok(k.clone()),
            DependencyRef::Role(r) => resolve_role_key(&self.objects, r, self.master_user()),
        }
    }

    /// Builds the full graph (registered objects plus the link entities
    /// their `link_children` introduce) and a lookup of every vertex's
    /// `Node`, with role-shaped dependencies resolved to concrete keys.
    /// Grounded on `Setup.generate_graph`.
    pub fn generate_graph(&self) -> Result<(Graph<ObjectKey>, Registry)> {
        let mut full: Registry = self.objects.clone();
        for node in self.objects.values() {
            if let Node::Managed(obj) = node {
                for link in obj.link_children() {
                    full.insert(link.key(), Node::Link(link));
                }
            }
        }

        let mut graph = Graph::new();
        for (key, node) in &full {
            graph.insert_vertex(key.clone());
            for dep in node.dependencies() {
                let dep_key = self.resolve_dependency(&dep)?;
                graph.add_edge(key.clone(), dep_key);
            }
        }

        Ok((graph, full))
    }

    /// The full vertex set in dependency order (dependencies first), plus
    /// the node lookup used to resolve `DefaultPrivilege` targets.
    pub fn topological_order(&self) -> Result<(Vec<Node>, Registry)> {
        let (graph, full) = self.generate_graph()?;
        let order = graph.topological_sort_kahn()?;
        let nodes = order
            .into_iter()
            .map(|key| full.get(&key).cloned().expect("every graph vertex has a node"))
            .collect();
        Ok((nodes, full))
    }

    /// Loads the observed state needed to classify every registered
    /// object: the master database first, then one connection per
    /// registered database.
    pub fn load_observed_state(&mut self) -> Result<ObservedState> {
        let managed = self.managed_databases();
        ObservedState::load(&mut self.connection_manager, &managed)
    }

    /// The three-pass statement generator. Grounded on `Setup._generate_stmts`.
    pub fn generate_statements(&self, observed: &ObservedState) -> Result<Vec<Statement>> {
        let (order, full) = self.topological_order()?;
        let ctx = self.ctx();
        let mut stmts = Vec::new();

        for node in &order {
            let state = observed.classify(node, &full);
            if !node.present() {
                continue;
            }
            if state.is_absent() || state.is_unknown() {
                stmts.extend(create_stmts(node, &ctx)?);
            } else if state.is_different() {
                stmts.extend(update_stmts(node, &ctx)?);
            }
        }

        for node in &order {
            if node.present() {
                if let Node::Managed(obj) = node {
                    stmts.extend(obj.stmts_to_maintain(&ctx, &full)?);
                }
            }
        }

        for node in order.iter().rev() {
            let state = observed.classify(node, &full);
            if node.present() {
                continue;
            }
            if state.is_present() || state.is_unknown() {
                stmts.extend(drop_stmts(node, &ctx)?);
            }
        }

        Ok(stmts)
    }

    /// A numbered listing of the topological order with each object's
    /// classified state, matching `Setup.inspect`'s layout. When
    /// `load_current_state` is `false`, no connection is opened at all and
    /// every state string is empty, matching `inspect(load_current_state=False)`.
    pub fn inspect(&mut self, load_current_state: bool) -> Result<Vec<(usize, bool, String, ObjectKey)>> {
        let observed = if load_current_state {
            Some(self.load_observed_state()?)
        } else {
            None
        };
        let (order, full) = self.topological_order()?;
        Ok(order
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let state = observed
                    .as_ref()
                    .map(|o| o.classify(node, &full).to_string())
                    .unwrap_or_default();
                (i + 1, node.present(), state, node.key())
            })
            .collect())
    }

    /// Reconciles the cluster against the registry. In dry-run mode,
    /// observed state is still loaded and every statement still generated,
    /// but nothing is dispatched to the driver.
    pub fn execute(&mut self, dry_run: bool) -> Result<Vec<Statement>> {
        let observed = self.load_observed_state()?;
        let stmts = self.generate_statements(&observed)?;

        if dry_run {
            return Ok(stmts);
        }

        for stmt in &stmts {
            self.dispatch(stmt)?;
        }
        Ok(stmts)
    }

    fn dispatch(&mut self, stmt: &Statement) -> Result<()> {
        if stmt.is_on_all_databases() {
            for datname in self.managed_databases() {
                let present = matches!(
                    self.objects.get(&Database { name: datname.clone(), owner: None, present: true }.key()),
                    Some(Node::Managed(ManagedObject::Database(d))) if d.present
                );
                if !present {
                    #[cfg(feature = "tracing")]
                    tracing::info!("skipping statement on non-existent database {datname:?}");
                    continue;
                }
                self.execute_on(&datname, stmt)?;
            }
            return Ok(());
        }

        match stmt.database() {
            Routing::Master => {
                let db = self.master_database().to_string();
                self.execute_on(&db, stmt)
            }
            Routing::Named(db) => {
                let db = db.clone();
                self.execute_on(&db, stmt)
            }
            Routing::AllDatabases => unreachable!("handled above"),
        }
    }

    /// Closes any cached connection to the dropped database first, the way
    /// `Setup.execute`'s `execute_stmt` does, so the `DROP DATABASE` does
    /// not conflict with an open session to it.
    fn execute_on(&mut self, database: &str, stmt: &Statement) -> Result<()> {
        if let Statement::Drop(d) = stmt {
            if d.kind == crate::statement::ObjectKind::Database {
                self.connection_manager.close_database(&d.name);
            }
        }
        let conn = self.connection_manager.database(database)?;
        run_statement(conn, stmt)
    }
}

fn run_statement(conn: &mut dyn crate::connection::Connection, stmt: &Statement) -> Result<()> {
    match stmt {
        Statement::Create(c) => conn.execute(&c.query()).map(|_| ()),
        Statement::Drop(d) => conn.execute(&d.query()).map(|_| ()),
        Statement::Text(t) => conn.execute(&t.query).map(|_| ()),
        Statement::Transaction(inner, _) => {
            conn.begin()?;
            for s in inner {
                if let Err(err) = run_statement(conn, s) {
                    let _ = conn.rollback();
                    return Err(err);
                }
            }
            conn.commit()
        }
    }
}

fn create_stmts(node: &Node, ctx: &EmitCtx<'_>) -> Result<Vec<Statement>> {
    match node {
        Node::Managed(o) => o.stmts_to_create(ctx),
        Node::Link(o) => o.stmts_to_create(),
    }
}

fn update_stmts(node: &Node, ctx: &EmitCtx<'_>) -> Result<Vec<Statement>> {
    match node {
        Node::Managed(o) => o.stmts_to_update(ctx),
        // Link entities never classify as DIFFERENT (DatabaseOwner/SchemaOwner
        // downgrade mismatches to ABSENT instead), so this arm is unreachable
        // in practice; fall back to create for safety.
        Node::Link(o) => o.stmts_to_create(),
    }
}

fn drop_stmts(node: &Node, ctx: &EmitCtx<'_>) -> Result<Vec<Statement>> {
    match node {
        Node::Managed(o) => o.stmts_to_drop(ctx),
        Node::Link(o) => o.stmts_to_drop(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, QueryResult};

    struct FakeConnection {
        database: String,
        log: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
    }

    impl Connection for FakeConnection {
        fn database(&self) -> &str {
            &self.database
        }
        fn username(&self) -> &str {
            "admin"
        }
        fn host(&self) -> &str {
            "localhost"
        }
        fn execute(&mut self, query: &str) -> Result<QueryResult> {
            self.log.borrow_mut().push(format!("{}: {query}", self.database));
            Ok(QueryResult::default())
        }
        fn begin(&mut self) -> Result<()> {
            Ok(())
        }
        fn commit(&mut self) -> Result<()> {
            Ok(())
        }
        fn rollback(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) {}
        fn clone_for_database(&self, database: &str) -> Result<Box<dyn Connection>> {
            Ok(Box::new(FakeConnection { database: database.to_string(), log: self.log.clone() }))
        }
    }

    fn setup_with_fake() -> (Setup, std::rc::Rc<std::cell::RefCell<Vec<String>>>) {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let master = Box::new(FakeConnection { database: "postgres".into(), log: log.clone() });
        let cm = ConnectionManager::new(master);
        (Setup::new(cm), log)
    }

    #[test]
    fn test_implicit_objects_preregistered() {
        let (setup, _) = setup_with_fake();
        assert!(setup.contains("Group(public)"));
        assert!(setup.contains("User(admin)"));
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let (mut setup, _) = setup_with_fake();
        let g = ManagedObject::Group(Group { name: "devops".into(), present: true });
        setup.register(g.clone()).unwrap();
        assert!(matches!(
            setup.register(g).unwrap_err(),
            ReconcileError::DuplicateRegistration { .. }
        ));
    }

    #[test]
    fn test_register_missing_dependency_errors() {
        let (mut setup, _) = setup_with_fake();
        let db = ManagedObject::Database(Database { name: "sales".into(), owner: Some("nobody".into()), present: true });
        assert!(matches!(
            setup.register(db).unwrap_err(),
            ReconcileError::AmbiguousRole { .. }
        ));
    }

    #[test]
    fn test_register_absent_dependency_errors() {
        let (mut setup, _) = setup_with_fake();
        setup
            .register(ManagedObject::Group(Group { name: "devops".into(), present: false }))
            .unwrap();
        let u = ManagedObject::User(User {
            name: "peter".into(),
            present: true,
            password: None,
            groups: vec!["devops".into()],
            inherit: false,
            databases: vec![],
        });
        assert!(matches!(setup.register(u).unwrap_err(), ReconcileError::AbsentDependency { .. }));
    }

    #[test]
    fn test_topological_order_includes_link_children() {
        let (mut setup, _) = setup_with_fake();
        setup.register(ManagedObject::Group(Group { name: "devops".into(), present: true })).unwrap();
        setup
            .register(ManagedObject::User(User {
                name: "peter".into(),
                present: true,
                password: None,
                groups: vec!["devops".into()],
                inherit: false,
                databases: vec![],
            }))
            .unwrap();
        let (order, _) = setup.topological_order().unwrap();
        let pos = |k: &str| order.iter().position(|n| n.key() == k).unwrap();
        assert!(pos("Group(devops)") < pos("GroupUser(devops+peter)"));
        assert!(pos("User(peter)") < pos("GroupUser(devops+peter)"));
    }

    #[test]
    fn test_generate_statements_fresh_install_creates_database() {
        let (mut setup, _) = setup_with_fake();
        setup
            .register(ManagedObject::Database(Database { name: "sales".into(), owner: None, present: true }))
            .unwrap();
        let observed = ObservedState::default();
        let stmts = setup.generate_statements(&observed).unwrap();
        assert!(stmts.iter().any(|s| matches!(s, Statement::Create(c) if c.name == "sales")));
    }

    #[test]
    fn test_execute_dry_run_does_not_touch_driver() {
        let (mut setup, log) = setup_with_fake();
        setup
            .register(ManagedObject::Database(Database { name: "sales".into(), owner: None, present: true }))
            .unwrap();
        // Observed state is still loaded (SELECT queries against the fake
        // connection get logged), but no CREATE/DROP/GRANT/etc. statement
        // generated from the registry should reach the driver.
        setup.execute(true).unwrap();
        assert!(!log.borrow().iter().any(|l| l.contains("CREATE DATABASE")));
    }

    #[test]
    fn test_execute_applies_statements() {
        let (mut setup, log) = setup_with_fake();
        setup
            .register(ManagedObject::Database(Database { name: "sales".into(), owner: None, present: true }))
            .unwrap();
        setup.execute(false).unwrap();
        assert!(log.borrow().iter().any(|l| l.contains("CREATE DATABASE sales")));
    }
}
