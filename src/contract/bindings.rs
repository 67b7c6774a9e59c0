use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    FeeCollector,
    "src/contract/abis/FeeCollector.json"
}
