//! Shared helpers for unit tests

use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use workday_api::{Employee, Event};
use workday_store::{SqliteStore, Store, StoreResult};

use crate::EventSink;

/// Keeps every published event
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// 2026-05-04 at the given Asia/Kolkata wall-clock time
pub fn ist(h: u32, m: u32) -> DateTime<Utc> {
    chrono_tz::Asia::Kolkata
        .with_ymd_and_hms(2026, 5, 4, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn store_with(employees: Vec<Employee>) -> Arc<dyn Store> {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    store
        .transaction(|tx| -> StoreResult<()> {
            for e in &employees {
                tx.insert_employee(e)?;
            }
            Ok(())
        })
        .unwrap();
    store
}
