pub mod audit;
pub mod cancel;
pub mod config;
pub mod inventory;
pub mod ledger;
pub mod local_inventory;
pub mod lock;
pub mod names;
pub mod paths;
pub mod reconcile;
pub mod remote_inventory;
pub mod util;
pub mod vault;
pub mod warn;
pub mod watcher;
