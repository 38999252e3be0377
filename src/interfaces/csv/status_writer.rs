use crate::domain::expense::ExpenseView;
use crate::error::Result;
use std::io::Write;

/// Writes expense status projections as CSV.
///
/// Columns: `expense,status,rejection_reason`.
pub struct StatusWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatusWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_expenses(&mut self, expenses: Vec<ExpenseView>) -> Result<()> {
        for view in expenses {
            self.writer.serialize(view)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
