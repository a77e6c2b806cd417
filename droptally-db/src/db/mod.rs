mod groups;
mod notifications;
mod options;
mod players;
mod points;
mod submissions;

pub use groups::*;
pub use notifications::*;
pub use options::*;
pub use players::*;
pub use points::*;
pub use submissions::*;
