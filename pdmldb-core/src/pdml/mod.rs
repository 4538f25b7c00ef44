//! PDML packet stream handling: tree building, fixup/typing hooks and
//! flattening into rows.

mod flatten;
mod node;
mod reader;
mod transform;

pub use flatten::flatten_packet;
pub use node::{Attributes, NodeKind, PacketTree, TreeNode};
pub use reader::PdmlReader;
pub use transform::{PacketTransformer, TransformStats};
