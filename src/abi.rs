//! Solidity bindings for the marketplace contract.
//!
//! Only the events the indexer consumes and the single view function used to
//! cross-check trades are declared here.

#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    event ListingCreated(
        uint256 indexed id,
        address indexed nftContract,
        uint256 indexed tokenId,
        address seller,
        uint256 price
    );

    #[derive(Debug, PartialEq, Eq)]
    event ListingRemoved(uint256 indexed id, address indexed owner);

    #[derive(Debug, PartialEq, Eq)]
    event ListingSold(uint256 indexed id, address indexed buyer);

    #[derive(Debug, PartialEq, Eq)]
    event TradeCreated(uint256 tradeId, address indexed from, address indexed to);

    #[derive(Debug, PartialEq, Eq)]
    event TradeAccepted(uint256 tradeId);

    #[derive(Debug, PartialEq, Eq)]
    event TradeRejected(uint256 tradeId);

    #[derive(Debug, PartialEq, Eq)]
    event TradeCompleted(uint256 tradeId);

    #[derive(Debug, PartialEq, Eq)]
    struct TradeSide {
        address user;
        uint256[] tokenIds;
        address[] nftContracts;
    }

    #[derive(Debug, PartialEq, Eq)]
    function getTrade(uint256 tradeId) external view returns (TradeSide from, TradeSide to, bool isActive);
}
