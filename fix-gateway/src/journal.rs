//! CSV journal of application messages received by the session.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::messages::AppMessage;

const HEADER: [&str; 10] = [
    "Date", "Time", "MsgType", "Symbol", "Side", "OrderQty", "Price", "OrderID", "ExecType", "OrdStatus",
];

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Failed to open journal file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write journal row: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct JournalRow {
    date: String,
    time: String,
    msg_type: &'static str,
    symbol: String,
    side: String,
    order_qty: String,
    price: String,
    order_id: String,
    exec_type: String,
    ord_status: String,
}

impl JournalRow {
    fn from_message(message: &AppMessage, at: NaiveDateTime) -> Self {
        let mut row = JournalRow {
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S%.3f").to_string(),
            msg_type: message.msg_type(),
            ..Default::default()
        };

        match message {
            AppMessage::ExecutionReport(report) => {
                row.symbol = report.symbol.clone();
                row.side = report.side.code().to_string();
                row.order_qty = report.order_qty.to_string();
                row.price = report.last_px.unwrap_or(report.avg_px).to_string();
                row.order_id = report.order_id.clone();
                row.exec_type = report.exec_type.code().to_string();
                row.ord_status = report.ord_status.code().to_string();
            }
            AppMessage::OrderCancelReject(reject) => {
                row.order_id = reject.order_id.clone();
                row.ord_status = reject.ord_status.code().to_string();
            }
            AppMessage::MarketDataSnapshot(snapshot) => {
                row.symbol = snapshot.symbol.clone();
            }
            AppMessage::MarketDataRequestReject(_) => {}
        }
        row
    }
}

pub struct Journal<W: Write> {
    writer: csv::Writer<W>,
}

impl Journal<File> {
    /// Create (truncating) the journal file and write the header.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, JournalError> {
        let file = File::create(path)?;
        Self::from_writer(file)
    }
}

impl<W: Write> Journal<W> {
    pub fn from_writer(inner: W) -> Result<Self, JournalError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn record(&mut self, message: &AppMessage) -> Result<(), JournalError> {
        self.record_at(message, Local::now().naive_local())
    }

    pub fn record_at(&mut self, message: &AppMessage, at: NaiveDateTime) -> Result<(), JournalError> {
        self.writer.serialize(JournalRow::from_message(message, at))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, JournalError> {
        self.writer
            .into_inner()
            .map_err(|e| JournalError::Io(e.into_error()))
    }
}
