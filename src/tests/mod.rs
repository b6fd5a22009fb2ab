//! 测试模块入口：公共逻辑在 `lib` 子模块，各模块的测试在 `internal`。

#[cfg(test)]
pub use lib::*;
