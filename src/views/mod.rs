mod chat;
mod materials;

pub use chat::ChatView;
pub use materials::MaterialsPanel;
