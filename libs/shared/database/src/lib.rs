pub mod memory;
pub mod state;
pub mod store;
pub mod supabase;

pub use memory::MemoryStore;
pub use state::AppState;
pub use store::{Document, DocumentStore, StoreError, Write, WriteBatch};
pub use supabase::SupabaseStore;
