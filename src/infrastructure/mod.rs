pub mod in_memory;
pub mod scripted;

#[cfg(feature = "gateway-daraja")]
pub mod daraja;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
#[cfg(feature = "channel-websocket")]
pub mod websocket;
