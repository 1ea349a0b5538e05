use std::collections::BTreeMap;
use std::sync::Arc;

use protocol::{CreatePlayRequest, GameType};
use serde_json::Value;

use super::{Game, GameError, TicTacToeRules};

/// Rules for one game type.
pub trait RuleSet: Send + Sync {
    fn game_type(&self) -> GameType;

    fn create(&self, request: &CreatePlayRequest) -> Box<dyn Game>;

    fn restore(&self, state: &Value) -> Result<Box<dyn Game>, GameError>;
}

/// Registry of the rule sets this worker can host.
#[derive(Clone)]
pub struct RuleBook {
    rules: BTreeMap<GameType, Arc<dyn RuleSet>>,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::empty().with(TicTacToeRules)
    }
}

impl RuleBook {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn with(mut self, rules: impl RuleSet + 'static) -> Self {
        self.rules.insert(rules.game_type(), Arc::new(rules));
        self
    }

    pub fn supports(&self, game_type: GameType) -> bool {
        self.rules.contains_key(&game_type)
    }

    fn rules_for(&self, game_type: GameType) -> Result<&Arc<dyn RuleSet>, GameError> {
        self.rules
            .get(&game_type)
            .ok_or_else(|| GameError::Unsupported(game_type.to_string()))
    }

    pub fn create(
        &self,
        game_type: GameType,
        request: &CreatePlayRequest,
    ) -> Result<Box<dyn Game>, GameError> {
        Ok(self.rules_for(game_type)?.create(request))
    }

    /// Rebuilds a game from its persisted JSON, dispatching on `gametype`.
    pub fn restore(&self, state: &Value) -> Result<Box<dyn Game>, GameError> {
        let tag = state
            .get("gametype")
            .and_then(Value::as_str)
            .ok_or_else(|| GameError::Corrupt("missing gametype".to_string()))?;
        let game_type: GameType = tag
            .parse()
            .map_err(|_| GameError::Unsupported(tag.to_string()))?;
        self.rules_for(game_type)?.restore(state)
    }
}
