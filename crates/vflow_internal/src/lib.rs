pub use vflow_core as model;
pub use vflow_io as io;
pub use vflow_table as table;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use vflow_core::prelude::*;
    #[doc(hidden)]
    pub use vflow_io::prelude::*;
    #[doc(hidden)]
    pub use vflow_table::prelude::*;
}
