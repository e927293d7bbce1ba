pub mod execution_util;
