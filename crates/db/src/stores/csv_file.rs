use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use orderdesk_core::domain::order::{Order, OrderId, OrderStatus};
use orderdesk_core::store::{OrderStore, OrderTable, StoreError};

use super::OrderRow;

/// Single-file engine. A missing file is an empty table; saves go through a
/// sibling temp file that is synced and renamed over the original.
pub struct CsvOrderStore {
    path: PathBuf,
    table: OrderTable,
}

impl CsvOrderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), table: OrderTable::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a header-only file when none exists yet. Returns whether a file
    /// was created.
    pub async fn ensure_file(&self) -> Result<bool, StoreError> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(false);
        }
        write_atomically(&self.path, encode(&[])?).await?;
        Ok(true)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn decode(bytes: &[u8]) -> Result<Vec<Order>, StoreError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Fields).from_reader(bytes);
    let mut orders = Vec::new();
    for record in reader.deserialize::<OrderRow>() {
        let row = record.map_err(|error| StoreError::Decode(error.to_string()))?;
        orders.push(row.into_order()?);
    }
    Ok(orders)
}

fn encode(orders: &[Order]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    let encode_error = |error: csv::Error| StoreError::Io(error.to_string());

    writer
        .write_record(["order_id", "item", "status", "customer_id", "order_date"])
        .map_err(encode_error)?;
    for order in orders {
        writer.serialize(OrderRow::from(order)).map_err(encode_error)?;
    }
    writer.into_inner().map_err(|error| StoreError::Io(error.to_string()))
}

async fn write_atomically(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
    let temp = temp_path(path);
    tokio::fs::write(&temp, bytes).await?;
    tokio::fs::File::open(&temp).await?.sync_all().await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}

#[async_trait]
impl OrderStore for CsvOrderStore {
    async fn load(&self) -> Result<(), StoreError> {
        let orders = match tokio::fs::read(&self.path).await {
            Ok(bytes) => decode(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };
        debug!(event_name = "store.loaded", engine = "csv", rows = orders.len());
        self.table.replace(orders).await;
        Ok(())
    }

    async fn save(&self) -> Result<(), StoreError> {
        let orders = self.table.snapshot().await;
        let bytes = encode(&orders)?;
        if let Err(error) = write_atomically(&self.path, bytes).await {
            let _ = tokio::fs::remove_file(temp_path(&self.path)).await;
            return Err(error);
        }
        debug!(event_name = "store.saved", engine = "csv", rows = orders.len());
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.table.get(id).await)
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
        status_filter: Option<&[OrderStatus]>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Order>, StoreError> {
        Ok(self.table.by_customer(customer_id, status_filter, since).await)
    }

    async fn upsert(&self, order: Order) -> Result<(), StoreError> {
        self.table.upsert(order).await;
        Ok(())
    }

    /// Passes when the file is readable, or when it is absent but its
    /// directory exists and a save could create it.
    async fn probe(&self) -> Result<(), StoreError> {
        if tokio::fs::try_exists(&self.path).await? {
            tokio::fs::metadata(&self.path).await?;
            return Ok(());
        }
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let metadata = tokio::fs::metadata(parent).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Io(format!("{} is not a directory", parent.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};

    #[test]
    fn header_only_file_decodes_to_empty_table() {
        let bytes = encode(&[]).expect("encode");
        let text = String::from_utf8(bytes.clone()).expect("utf8");
        assert_eq!(text.trim(), "order_id,item,status,customer_id,order_date");
        assert!(decode(&bytes).expect("decode").is_empty());
    }

    #[test]
    fn quoted_items_with_commas_survive() {
        let raw = "order_id,item,status,customer_id,order_date\n\
                   ORD-9,\"cable, 2m\",Placed,,2026-09-30\n";
        let orders = decode(raw.as_bytes()).expect("decode");
        assert_eq!(orders[0].item, "cable, 2m");
        assert_eq!(orders[0].customer_id, None);

        let again = decode(&encode(&orders).expect("encode")).expect("decode");
        assert_eq!(again, orders);
    }
}
