pub mod arrays;
pub mod closures;
pub mod functions;
pub mod natives;
pub mod strings;
pub mod structs;

pub use arrays::Array;
pub use closures::{Closure, Upvalue, UpvalueState};
pub use functions::{Chunk, Function};
pub use natives::{Native, NativeFn};
pub use strings::VMString;
pub use structs::{BoundMethod, FIELD_INDEX_THRESHOLD, Instance, StructDef};
