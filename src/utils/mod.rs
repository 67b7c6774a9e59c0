pub mod uint256;
