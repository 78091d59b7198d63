// Lottery Program - Per-cluster deployment parameters
use std::{fmt, str::FromStr};

use solana_program::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

use crate::{
    error::LotteryError,
    state::LotteryParams,
    utils::{find_coordinator_address, sol_to_lamports},
};

/// Lamports a development deployment funds its subscription with
pub const SUBSCRIPTION_FUND_AMOUNT: u64 = 3 * LAMPORTS_PER_SOL;

/// Oracle key hash used on clusters without a dedicated lane
pub const DEFAULT_GAS_LANE: [u8; 32] = [
    0x47, 0x4e, 0x34, 0xa0, 0x77, 0xdf, 0x58, 0x80, 0x7d, 0xbe, 0x9c, 0x96, 0xd3, 0xc0, 0x09, 0xb2,
    0x3b, 0x3c, 0x6d, 0x0c, 0xce, 0x43, 0x3e, 0x59, 0xbb, 0xf5, 0xb3, 0x4f, 0x82, 0x3b, 0xc5, 0x6c,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cluster {
    Localnet,
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Cluster {
    /// Development clusters get a mock coordinator and a freshly funded
    /// subscription at deploy time
    pub fn is_development(&self) -> bool {
        matches!(self, Cluster::Localnet)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Cluster::Localnet => "localnet",
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Cluster {
    type Err = LotteryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            _ => Err(LotteryError::InvalidConfig),
        }
    }
}

/// Deployment parameters of one cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub cluster: Cluster,
    pub entrance_fee: u64,
    pub interval: u64,
    pub gas_lane: [u8; 32],
    pub callback_gas_limit: u32,
    pub max_players: u32,
    /// Existing coordinator; development clusters deploy their own
    pub coordinator: Option<Pubkey>,
    /// Existing subscription; development clusters create and fund one
    pub subscription_id: Option<u64>,
}

impl NetworkConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        let base = NetworkConfig {
            cluster,
            entrance_fee: sol_to_lamports(0.01),
            interval: 30,
            gas_lane: DEFAULT_GAS_LANE,
            callback_gas_limit: 500_000,
            max_players: 100,
            coordinator: None,
            subscription_id: None,
        };
        match cluster {
            Cluster::Localnet => base,
            Cluster::Devnet | Cluster::Testnet => NetworkConfig {
                subscription_id: Some(1),
                ..base
            },
            Cluster::MainnetBeta => NetworkConfig {
                entrance_fee: sol_to_lamports(0.1),
                interval: 24 * 60 * 60,
                max_players: 1_000,
                ..base
            },
        }
    }

    /// Coordinator the lottery registers with. Development clusters use the
    /// program's own coordinator, production clusters must name one.
    pub fn coordinator_address(&self, program_id: &Pubkey) -> Result<Pubkey, LotteryError> {
        if self.cluster.is_development() {
            return Ok(self
                .coordinator
                .unwrap_or_else(|| find_coordinator_address(program_id).0));
        }
        self.coordinator.ok_or(LotteryError::InvalidConfig)
    }

    /// Lottery parameters for this cluster. Development clusters pass the id
    /// of the subscription created during deployment; production clusters
    /// must supply both a coordinator and a subscription.
    pub fn lottery_params(&self, created_subscription: Option<u64>) -> Result<LotteryParams, LotteryError> {
        let subscription_id = if self.cluster.is_development() {
            created_subscription.or(self.subscription_id)
        } else {
            if self.coordinator.is_none() {
                return Err(LotteryError::InvalidConfig);
            }
            self.subscription_id
        }
        .ok_or(LotteryError::InvalidConfig)?;

        let params = LotteryParams {
            entrance_fee: self.entrance_fee,
            interval: self.interval,
            gas_lane: self.gas_lane,
            subscription_id,
            callback_gas_limit: self.callback_gas_limit,
            max_players: self.max_players,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_names_round_trip() {
        for cluster in [
            Cluster::Localnet,
            Cluster::Devnet,
            Cluster::Testnet,
            Cluster::MainnetBeta,
        ] {
            assert_eq!(cluster.name().parse::<Cluster>(), Ok(cluster));
        }
        assert_eq!("localhost".parse::<Cluster>(), Ok(Cluster::Localnet));
        assert_eq!("goerli".parse::<Cluster>(), Err(LotteryError::InvalidConfig));
    }

    #[test]
    fn localnet_uses_the_created_subscription() {
        let config = NetworkConfig::for_cluster(Cluster::Localnet);
        assert!(config.cluster.is_development());
        assert_eq!(config.lottery_params(None), Err(LotteryError::InvalidConfig));

        let params = config.lottery_params(Some(7)).unwrap();
        assert_eq!(params.subscription_id, 7);
        assert_eq!(params.entrance_fee, 10_000_000);
        assert_eq!(params.interval, 30);
        assert_eq!(params.callback_gas_limit, 500_000);
    }

    #[test]
    fn production_clusters_ignore_deploy_time_subscriptions() {
        let mut config = NetworkConfig::for_cluster(Cluster::MainnetBeta);
        config.coordinator = Some(Pubkey::new_unique());
        assert!(!config.cluster.is_development());
        assert_eq!(config.lottery_params(Some(3)), Err(LotteryError::InvalidConfig));

        config.subscription_id = Some(42);
        assert_eq!(config.lottery_params(Some(3)).unwrap().subscription_id, 42);
    }

    #[test]
    fn production_clusters_require_a_coordinator() {
        let program_id = Pubkey::new_unique();
        let mut config = NetworkConfig::for_cluster(Cluster::Devnet);
        assert_eq!(config.subscription_id, Some(1));
        assert_eq!(config.lottery_params(None), Err(LotteryError::InvalidConfig));
        assert_eq!(
            config.coordinator_address(&program_id),
            Err(LotteryError::InvalidConfig)
        );

        let coordinator = Pubkey::new_unique();
        config.coordinator = Some(coordinator);
        assert_eq!(config.lottery_params(None).unwrap().subscription_id, 1);
        assert_eq!(config.coordinator_address(&program_id), Ok(coordinator));
    }

    #[test]
    fn localnet_defaults_to_the_program_coordinator() {
        let program_id = Pubkey::new_unique();
        let config = NetworkConfig::for_cluster(Cluster::Localnet);
        assert_eq!(
            config.coordinator_address(&program_id),
            Ok(find_coordinator_address(&program_id).0)
        );
    }
}
