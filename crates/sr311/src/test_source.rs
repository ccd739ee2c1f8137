// In-memory SourceClient for unit tests
use crate::client::{PageQuery, SourceClient};
use crate::error::Result;
use crate::models::{Page, Record};
use serde_json::Value;
use std::cell::RefCell;

type Responder = Box<dyn Fn(&PageQuery) -> Result<Page>>;

/// Answers each request with a closure and records what was asked
pub struct ScriptedSource {
    responder: Responder,
    log: RefCell<Vec<PageQuery>>,
}

impl ScriptedSource {
    pub fn new(responder: impl Fn(&PageQuery) -> Result<Page> + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            log: RefCell::new(Vec::new()),
        }
    }

    /// Convert a JSON array literal into rows
    pub fn rows(value: Value) -> Page {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => map,
                    other => panic!("row must be an object, got {other}"),
                })
                .collect(),
            other => panic!("rows must be an array, got {other}"),
        }
    }

    /// `count` rows with a single date column set to `date`
    pub fn dated_rows(column: &str, date: &str, count: usize) -> Page {
        (0..count)
            .map(|i| {
                let mut row = Record::new();
                row.insert("sr_number".into(), Value::String(format!("SR{i:06}")));
                row.insert(column.into(), Value::String(date.into()));
                row
            })
            .collect()
    }

    pub fn requests(&self) -> Vec<PageQuery> {
        self.log.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.borrow().len()
    }
}

impl SourceClient for ScriptedSource {
    fn fetch_page(&self, query: &PageQuery) -> Result<Page> {
        self.log.borrow_mut().push(query.clone());
        (self.responder)(query)
    }
}
