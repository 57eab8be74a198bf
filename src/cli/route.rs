//! CLI route: single route table and run context.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_json, validation_json, StateView, SummaryView};
use crate::codec;
use crate::component::ComponentDelta;
use crate::config::{ConcordConfig, ConfigLoader};
use crate::contract::{ContractInterface, RoomContract};
use crate::crypto::{member_id, signing_key_from_seed};
use crate::delta::{self, RoomDelta};
use crate::error::{ApiError, ContractError};
use crate::replica::{Replica, ReplicaUpdate};
use crate::room::{AuthorizedMember, RoomParameters, RoomState};
use crate::store::{SledStateStore, StateStore};
use crate::types::{ContractInstanceId, MemberId, Parameters, State, StateDelta, StateSummary};
use crate::validate::RelatedStates;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, loaded configuration and the
/// room contract.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ConcordConfig,
    contract: RoomContract,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConcordConfig::load_validated(&workspace_root)?,
        };
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        Ok(Self {
            workspace_root,
            config,
            contract: RoomContract::new(),
        })
    }

    pub fn config(&self) -> &ConcordConfig {
        &self.config
    }

    fn open_store(&self) -> Result<Arc<dyn StateStore>, ApiError> {
        let path = self.config.storage.resolve(&self.workspace_root);
        Ok(Arc::new(SledStateStore::new(path)?))
    }

    /// Execute a command, returning the text to print.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Init {
                seed,
                name,
                registry,
                max_message_bytes,
                out,
            } => self.init(seed, name, registry.as_deref(), *max_message_bytes, out),
            Commands::Invite {
                params,
                state,
                seed,
                member,
                out,
            } => {
                let key = signing_key_from_seed(parse_seed(seed)?);
                let entry = AuthorizedMember::invite(parse_member(member)?, &key)?;
                self.extend(params, state, ComponentDelta::Members(vec![entry]), out)
            }
            Commands::Post {
                params,
                state,
                seed,
                content,
                out,
            } => {
                let key = signing_key_from_seed(parse_seed(seed)?);
                let room = codec::decode_state(&State::new(read_file(state)?))?;
                let message = room.compose_message(&key, content.as_str())?;
                self.extend(params, state, ComponentDelta::Messages(vec![message]), out)
            }
            Commands::Inspect { state } => {
                let room = codec::decode_state(&State::new(read_file(state)?))?;
                Ok(format_json(&StateView::new(&room)))
            }
            Commands::Validate {
                params,
                state,
                related,
            } => {
                let mut related_states = RelatedStates::new();
                for spec in related {
                    let (id, path) = parse_related(spec)?;
                    related_states.insert(id, State::new(read_file(&path)?));
                }
                let verdict = self.contract.validate_state(
                    &read_parameters(params)?,
                    &State::new(read_file(state)?),
                    &related_states,
                )?;
                Ok(format_json(&validation_json(&verdict)))
            }
            Commands::Summarize { params, state, out } => {
                let summary = self
                    .contract
                    .summarize_state(&read_parameters(params)?, &State::new(read_file(state)?))?;
                write_file(out, summary.as_bytes())?;
                let view = SummaryView::new(&codec::decode_summary(&summary)?);
                Ok(format_json(&json!({
                    "bytes": summary.len(),
                    "summary": view,
                })))
            }
            Commands::Delta {
                params,
                state,
                summary,
                out,
            } => {
                let delta = self.contract.get_state_delta(
                    &read_parameters(params)?,
                    &State::new(read_file(state)?),
                    &StateSummary::new(read_file(summary)?),
                )?;
                match delta {
                    Some(delta) => {
                        write_file(out, delta.as_bytes())?;
                        Ok(format_json(&json!({ "up_to_date": false, "bytes": delta.len() })))
                    }
                    None => Ok(format_json(&json!({ "up_to_date": true }))),
                }
            }
            Commands::Apply {
                params,
                state,
                delta,
                out,
                commit,
            } => self.apply(params, state, delta, out, *commit),
            Commands::Merge { params, a, b, out } => {
                let merged = self.contract.merge_states(
                    &read_parameters(params)?,
                    &State::new(read_file(a)?),
                    &State::new(read_file(b)?),
                )?;
                write_file(out, merged.as_bytes())?;
                Ok(format_json(&json!({ "bytes": merged.len() })))
            }
            Commands::List => {
                let ids: Vec<String> = self
                    .open_store()?
                    .list_ids()?
                    .iter()
                    .map(ContractInstanceId::to_hex)
                    .collect();
                Ok(format_json(&json!({ "instances": ids })))
            }
        }
    }

    fn init(
        &self,
        seed: &str,
        name: &str,
        registry: Option<&str>,
        max_message_bytes: Option<u32>,
        out: &Path,
    ) -> Result<String, ApiError> {
        let owner = signing_key_from_seed(parse_seed(seed)?);
        let mut params = RoomParameters::new(member_id(&owner));
        if let Some(registry) = registry {
            params = params.with_registry(parse_instance(registry)?);
        }
        if let Some(max) = max_message_bytes {
            params = params.with_max_message_bytes(max);
        }

        let parameters = codec::encode_parameters(&params)?;
        let state = codec::encode_state(&RoomState::initial(&owner, name)?)?;
        let replica = Replica::create(
            self.contract,
            parameters.clone(),
            state.clone(),
            RelatedStates::new(),
            self.open_store()?,
        )?;

        std::fs::create_dir_all(out)?;
        let params_path = out.join("parameters.bin");
        let state_path = out.join("state.bin");
        write_file(&params_path, parameters.as_bytes())?;
        write_file(&state_path, state.as_bytes())?;
        info!(instance = %replica.key(), "Initialized room");

        Ok(format_json(&json!({
            "instance": replica.key().instance.to_hex(),
            "owner": params.owner.to_hex(),
            "parameters": params_path.display().to_string(),
            "state": state_path.display().to_string(),
        })))
    }

    /// Add locally authored entries through the delta path, so they are
    /// checked exactly as a peer's delta would be.
    fn extend(
        &self,
        params: &Path,
        state: &Path,
        component: ComponentDelta,
        out: &Path,
    ) -> Result<String, ApiError> {
        let room_params = codec::decode_parameters(&read_parameters(params)?)?;
        let room = codec::decode_state(&State::new(read_file(state)?))?;
        let updated = delta::apply(&room_params, &room, &RoomDelta::new().with(component))
            .map_err(ContractError::from)?;
        let encoded = codec::encode_state(&updated)?;
        write_file(out, encoded.as_bytes())?;
        Ok(format_json(&StateView::new(&updated)))
    }

    fn apply(
        &self,
        params: &Path,
        state: &Path,
        delta: &Path,
        out: &Path,
        commit: bool,
    ) -> Result<String, ApiError> {
        let parameters = read_parameters(params)?;
        let delta = StateDelta::new(read_file(delta)?);
        let updated =
            self.contract
                .apply_delta(&parameters, &State::new(read_file(state)?), &delta)?;
        write_file(out, updated.as_bytes())?;

        let committed = if commit {
            let replica = Replica::open(self.contract, parameters, self.open_store()?)?;
            match replica.apply_delta(&delta)? {
                ReplicaUpdate::Committed { changed } => json!({ "changed": changed }),
                ReplicaUpdate::NeedsRelated(ids) => json!({
                    "needs_related": ids.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
                }),
            }
        } else {
            json!(null)
        };
        Ok(format_json(&json!({
            "bytes": updated.len(),
            "commit": committed,
        })))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ApiError> {
    std::fs::read(path).map_err(|e| {
        ApiError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ApiError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn read_parameters(path: &Path) -> Result<Parameters, ApiError> {
    Ok(Parameters::new(read_file(path)?))
}

fn parse_hex32(what: &str, s: &str) -> Result<[u8; 32], ApiError> {
    let bytes = hex::decode(s.trim())
        .map_err(|e| ApiError::InvalidInput(format!("{} is not hex: {}", what, e)))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| ApiError::InvalidInput(format!("{} must be 32 bytes", what)))
}

fn parse_seed(s: &str) -> Result<[u8; 32], ApiError> {
    parse_hex32("seed", s)
}

fn parse_member(s: &str) -> Result<MemberId, ApiError> {
    parse_hex32("member key", s).map(MemberId)
}

fn parse_instance(s: &str) -> Result<ContractInstanceId, ApiError> {
    parse_hex32("instance id", s).map(ContractInstanceId)
}

fn parse_related(spec: &str) -> Result<(ContractInstanceId, PathBuf), ApiError> {
    let (id, path) = spec.split_once('=').ok_or_else(|| {
        ApiError::InvalidInput(format!("related state must be <instance>=<file>, got '{}'", spec))
    })?;
    Ok((parse_instance(id)?, PathBuf::from(path)))
}
