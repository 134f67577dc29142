//! Integration tests for the export → transform → import pipeline
//!
//! Both databases are replaced with in-memory connections that record what
//! happened to them, while the staging files go through the real file system.

use rowshift::connection::{BulkLoader, Connection, ConnectionParams, RedshiftConnection, RowSource};
use rowshift::error::{BoxError, ConnectionError, TransformError};
use rowshift::etl::{Field, Row, Transformer};
use rowshift::{Pipeline, PipelineConfig, PipelineError, RunSummary};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Ordered log of connection lifecycle events shared by both fakes
#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: &str) {
        self.0.lock().unwrap().push(event.to_string());
    }

    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct MemorySource {
    rows: Vec<Row>,
    fail_connect: bool,
    fail_query: bool,
    events: Events,
    session: Option<MemorySourceSession>,
}

impl MemorySource {
    fn new(rows: Vec<Row>, events: Events) -> Self {
        Self {
            rows,
            fail_connect: false,
            fail_query: false,
            events,
            session: None,
        }
    }
}

struct MemorySourceSession {
    rows: Vec<Row>,
    fail_query: bool,
    queries: Vec<String>,
}

impl RowSource for MemorySourceSession {
    type Rows<'a> = std::vec::IntoIter<Row>;

    async fn query<'a>(&'a mut self, query: &'a str) -> Result<Self::Rows<'a>, BoxError> {
        self.queries.push(query.to_string());
        if self.fail_query {
            return Err("Unknown column 'Flag' in 'where clause'".into());
        }
        Ok(self.rows.clone().into_iter())
    }
}

impl Connection for MemorySource {
    type Session = MemorySourceSession;

    fn backend(&self) -> &'static str {
        "memory-source"
    }

    async fn connect(&mut self) -> Result<&mut MemorySourceSession, ConnectionError> {
        if self.fail_connect {
            return Err(ConnectionError::Connect {
                backend: "memory-source",
                host: "nowhere".to_string(),
                source: "connection refused".into(),
            });
        }
        self.events.push("source:connect");
        Ok(self.session.insert(MemorySourceSession {
            rows: self.rows.clone(),
            fail_query: self.fail_query,
            queries: Vec::new(),
        }))
    }

    fn session_mut(&mut self) -> Option<&mut MemorySourceSession> {
        self.session.as_mut()
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn disconnect(&mut self) {
        if self.session.take().is_some() {
            self.events.push("source:disconnect");
        }
    }
}

/// Warehouse table contents visible after a commit
#[derive(Clone, Default)]
struct Table(Arc<Mutex<Vec<String>>>);

impl Table {
    fn rows(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct MemoryWarehouse {
    table: Table,
    fail_copy: bool,
    events: Events,
    session: Option<MemoryWarehouseSession>,
}

impl MemoryWarehouse {
    fn new(table: Table, events: Events) -> Self {
        Self {
            table,
            fail_copy: false,
            events,
            session: None,
        }
    }
}

struct MemoryWarehouseSession {
    table: Table,
    fail_copy: bool,
    pending: Vec<String>,
}

impl BulkLoader for MemoryWarehouseSession {
    async fn copy_from<R>(
        &mut self,
        _table: &str,
        _delimiter: char,
        reader: R,
    ) -> Result<u64, BoxError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        if self.fail_copy {
            return Err("extra data after last expected column".into());
        }
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            self.pending.push(line);
        }
        Ok(self.pending.len() as u64)
    }

    async fn commit(&mut self) -> Result<(), BoxError> {
        let pending = std::mem::take(&mut self.pending);
        self.table.0.lock().unwrap().extend(pending);
        Ok(())
    }
}

impl Connection for MemoryWarehouse {
    type Session = MemoryWarehouseSession;

    fn backend(&self) -> &'static str {
        "memory-warehouse"
    }

    async fn connect(&mut self) -> Result<&mut MemoryWarehouseSession, ConnectionError> {
        self.events.push("warehouse:connect");
        Ok(self.session.insert(MemoryWarehouseSession {
            table: self.table.clone(),
            fail_copy: self.fail_copy,
            pending: Vec::new(),
        }))
    }

    fn session_mut(&mut self) -> Option<&mut MemoryWarehouseSession> {
        self.session.as_mut()
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn disconnect(&mut self) {
        if self.session.take().is_some() {
            self.events.push("warehouse:disconnect");
        }
    }
}

fn flagged_rows() -> Vec<Row> {
    vec![
        vec![Field::Int(1), Field::from("x"), Field::from("a")],
        vec![Field::Int(2), Field::from("y"), Field::from("b")],
    ]
}

fn config_in(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        exported_path: dir.path().join("data_files").join("exported.dat"),
        transformed_path: dir.path().join("data_files").join("transformed.dat"),
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_end_to_end_run() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp);
    let events = Events::default();
    let table = Table::default();

    let mut pipeline = Pipeline::new(
        MemorySource::new(flagged_rows(), events.clone()),
        MemoryWarehouse::new(table.clone(), events.clone()),
        config.clone(),
    );

    let summary = pipeline.execute().await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            exported: 2,
            transformed: 2,
            imported: 1,
        }
    );
    assert_eq!(
        std::fs::read_to_string(&config.exported_path).unwrap(),
        "1,x,a\n2,y,b\n"
    );
    assert_eq!(
        std::fs::read_to_string(&config.transformed_path).unwrap(),
        "1,A_,a\n2,B_,b\n"
    );
    // The first transformed line is always treated as a header
    assert_eq!(table.rows(), vec!["2,B_,b".to_string()]);
    assert_eq!(
        events.all(),
        vec![
            "source:connect",
            "source:disconnect",
            "warehouse:connect",
            "warehouse:disconnect",
        ]
    );
    assert!(!pipeline.source().is_connected());
    assert!(!pipeline.warehouse().is_connected());
}

#[tokio::test]
async fn test_default_query_is_sent_to_source() {
    let temp = TempDir::new().unwrap();
    let mut source = MemorySource::new(flagged_rows(), Events::default());

    let session = source.connect().await.unwrap();
    rowshift::Exporter::default()
        .export(
            session,
            &PipelineConfig::default().query,
            temp.path().join("out.dat"),
        )
        .await
        .unwrap();

    let session = source.session_mut().unwrap();
    assert_eq!(session.queries, vec!["SELECT * FROM Data WHERE Flag = TRUE"]);
    source.disconnect().await;
}

#[tokio::test]
async fn test_source_connection_failure_stops_run() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp);
    let events = Events::default();
    let mut source = MemorySource::new(flagged_rows(), events.clone());
    source.fail_connect = true;

    let mut pipeline = Pipeline::new(
        source,
        MemoryWarehouse::new(Table::default(), events.clone()),
        config.clone(),
    );

    let err = pipeline.execute().await.unwrap_err();

    assert!(matches!(err, PipelineError::Connection(_)));
    assert!(events.all().is_empty());
    assert!(!config.exported_path.exists());
}

#[tokio::test]
async fn test_run_swallows_failures() {
    let temp = TempDir::new().unwrap();
    let events = Events::default();
    let mut source = MemorySource::new(flagged_rows(), events.clone());
    source.fail_connect = true;

    let mut pipeline = Pipeline::new(
        source,
        MemoryWarehouse::new(Table::default(), events.clone()),
        config_in(&temp),
    );

    pipeline.run().await;

    assert!(events.all().is_empty());
}

#[tokio::test]
async fn test_export_failure_still_disconnects_source() {
    let temp = TempDir::new().unwrap();
    let events = Events::default();
    let mut source = MemorySource::new(flagged_rows(), events.clone());
    source.fail_query = true;

    let mut pipeline = Pipeline::new(
        source,
        MemoryWarehouse::new(Table::default(), events.clone()),
        config_in(&temp),
    );

    let err = pipeline.execute().await.unwrap_err();

    assert!(matches!(err, PipelineError::Export(_)));
    assert_eq!(events.all(), vec!["source:connect", "source:disconnect"]);
    assert!(!pipeline.source().is_connected());
}

#[tokio::test]
async fn test_short_rows_fail_transform_before_warehouse() {
    let temp = TempDir::new().unwrap();
    let events = Events::default();
    let table = Table::default();
    let rows = vec![
        vec![Field::Int(1), Field::from("x"), Field::from("a")],
        vec![Field::Int(2), Field::from("y")],
    ];

    let mut pipeline = Pipeline::new(
        MemorySource::new(rows, events.clone()),
        MemoryWarehouse::new(table.clone(), events.clone()),
        config_in(&temp),
    );

    let err = pipeline.execute().await.unwrap_err();

    assert!(matches!(err, PipelineError::Transform(_)));
    assert_eq!(events.all(), vec!["source:connect", "source:disconnect"]);
    assert!(table.rows().is_empty());
}

#[tokio::test]
async fn test_import_failure_still_disconnects_warehouse() {
    let temp = TempDir::new().unwrap();
    let events = Events::default();
    let table = Table::default();
    let mut warehouse = MemoryWarehouse::new(table.clone(), events.clone());
    warehouse.fail_copy = true;

    let mut pipeline = Pipeline::new(
        MemorySource::new(flagged_rows(), events.clone()),
        warehouse,
        config_in(&temp),
    );

    let err = pipeline.execute().await.unwrap_err();

    assert!(matches!(err, PipelineError::Import(_)));
    assert_eq!(
        events.all(),
        vec![
            "source:connect",
            "source:disconnect",
            "warehouse:connect",
            "warehouse:disconnect",
        ]
    );
    assert!(table.rows().is_empty());
}

#[tokio::test]
async fn test_stages_can_run_individually() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp);
    let events = Events::default();
    let table = Table::default();

    let mut pipeline = Pipeline::new(
        MemorySource::new(flagged_rows(), events.clone()),
        MemoryWarehouse::new(table.clone(), events.clone()),
        config.clone(),
    );

    assert_eq!(pipeline.export_stage().await.unwrap(), 2);
    assert_eq!(events.all(), vec!["source:connect", "source:disconnect"]);

    assert_eq!(pipeline.transform_stage().await.unwrap(), 2);
    assert!(config.transformed_path.exists());

    assert_eq!(pipeline.import_stage().await.unwrap(), 1);
    assert_eq!(table.rows(), vec!["2,B_,b".to_string()]);
}

#[tokio::test]
async fn test_rerun_overwrites_staging_files() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp);
    let table = Table::default();

    let mut pipeline = Pipeline::new(
        MemorySource::new(flagged_rows(), Events::default()),
        MemoryWarehouse::new(table.clone(), Events::default()),
        config.clone(),
    );

    pipeline.execute().await.unwrap();
    pipeline.execute().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&config.exported_path).unwrap(),
        "1,x,a\n2,y,b\n"
    );
    // No deduplication: each run appends its rows again
    assert_eq!(table.rows(), vec!["2,B_,b".to_string(), "2,B_,b".to_string()]);
}

#[tokio::test]
async fn test_invalid_warehouse_port_fails_at_import() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp);
    let events = Events::default();
    let warehouse = RedshiftConnection::new(ConnectionParams {
        host: Some("warehouse.local".to_string()),
        port: Some("abc".to_string()),
        ..Default::default()
    });

    let mut pipeline = Pipeline::new(
        MemorySource::new(flagged_rows(), events.clone()),
        warehouse,
        config.clone(),
    );

    let err = pipeline.execute().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Connection(ConnectionError::InvalidParameter { name: "port", .. })
    ));
    // Export and transform ran before the warehouse was touched
    assert_eq!(events.all(), vec!["source:connect", "source:disconnect"]);
    assert!(config.exported_path.exists());
    assert!(config.transformed_path.exists());
    assert!(!pipeline.warehouse().is_connected());

    // The log-and-swallow entry point survives the same failure
    pipeline.run().await;
}

/// Prefixes every line with a fixed tag column
struct TagLines(&'static str);

impl Transformer for TagLines {
    type Input = String;
    type Output = String;

    fn transform(&self, input: String) -> Result<String, TransformError> {
        Ok(format!("{},{}", self.0, input))
    }
}

#[tokio::test]
async fn test_custom_transformer_drives_transform_stage() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp);
    let table = Table::default();

    let mut pipeline = Pipeline::new(
        MemorySource::new(flagged_rows(), Events::default()),
        MemoryWarehouse::new(table.clone(), Events::default()),
        config.clone(),
    )
    .with_transformer(TagLines("batch7"));

    let summary = pipeline.execute().await.unwrap();

    assert_eq!(summary.transformed, 2);
    assert_eq!(
        std::fs::read_to_string(&config.transformed_path).unwrap(),
        "batch7,1,x,a\nbatch7,2,y,b\n"
    );
    assert_eq!(table.rows(), vec!["batch7,2,y,b".to_string()]);
}
