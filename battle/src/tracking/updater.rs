//! Applying server messages and requests to a BattleState

use pokellm_protocol::{
    BattleRequest, HpStatus, Pokemon, PokemonDetails, ServerMessage, SidePokemon, to_id,
};

use super::state::{BattleState, Effectiveness, Matchup, PendingMove, position_to_slot};
use crate::types::{PokemonState, SideCondition, Status, Volatile};

const MAX_MATCHUPS: usize = 32;

impl BattleState {
    /// Apply one battle-log message.
    ///
    /// Returns the reason when the message contradicts the tracked state:
    /// HP, boost, faint and move lines naming a Pokemon that is unknown or
    /// not in the named slot, switches into a slot that does not exist, and
    /// turn numbers going backwards. Other lines about unknown Pokemon are
    /// ignored.
    pub(crate) fn apply_message(&mut self, msg: &ServerMessage) -> Result<(), String> {
        match msg {
            // === Battle initialization ===
            ServerMessage::BattlePlayer {
                player, username, ..
            } => {
                if !username.is_empty() {
                    self.get_or_create_side(*player, username);
                }
            }

            ServerMessage::TeamSize { player, size } => {
                self.get_or_create_side(*player, "").team_size = Some(*size);
            }

            ServerMessage::GameType(game_type) => self.set_game_type(*game_type),
            ServerMessage::Gen(generation) => self.generation = *generation,
            ServerMessage::Tier(tier) => self.tier = tier.clone(),

            ServerMessage::Turn(turn) => {
                if *turn < self.turn {
                    return Err(format!("turn went backwards from {} to {}", self.turn, turn));
                }
                self.turn = *turn;
                self.pending_move = None;
            }

            // === Major actions ===
            ServerMessage::Switch {
                pokemon,
                details,
                hp_status,
            }
            | ServerMessage::Drag {
                pokemon,
                details,
                hp_status,
            } => self.handle_switch(pokemon, details, hp_status.as_ref())?,

            ServerMessage::Replace {
                pokemon,
                details,
                hp_status,
            } => self.handle_replace(pokemon, details, hp_status.as_ref())?,

            ServerMessage::Faint(pokemon) => {
                self.referenced_mut(pokemon)?.faint();
            }

            ServerMessage::Move {
                pokemon,
                move_name,
                from,
                ..
            } => {
                let poke = self.referenced_mut(pokemon)?;
                // moves called through another move are not part of the moveset
                let called = from.as_deref().is_some_and(|f| f.starts_with("move: "));
                if !called {
                    poke.record_move(move_name);
                }
                let pending = PendingMove {
                    player: pokemon.player,
                    species: poke.species.clone(),
                    move_id: to_id(move_name),
                };
                self.pending_move = Some(pending);
            }

            ServerMessage::DetailsChange {
                pokemon,
                details,
                hp_status,
            } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.species = details.species.clone();
                    if let Some(hp) = hp_status {
                        poke.apply_hp_status(hp);
                    }
                }
            }

            ServerMessage::FormeChange {
                pokemon,
                species,
                hp_status,
            } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.species = species.clone();
                    if let Some(hp) = hp_status {
                        poke.apply_hp_status(hp);
                    }
                }
            }

            // === HP ===
            ServerMessage::Damage { pokemon, hp_status }
            | ServerMessage::Heal { pokemon, hp_status }
            | ServerMessage::SetHp { pokemon, hp_status } => {
                let poke = self.referenced_mut(pokemon)?;
                if let Some(hp) = hp_status {
                    poke.apply_hp_status(hp);
                }
            }

            // === Status ===
            ServerMessage::Status { pokemon, status } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.status = Status::from_protocol(status);
                }
            }

            ServerMessage::CureStatus { pokemon, .. } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.status = None;
                }
            }

            ServerMessage::CureTeam(pokemon) => {
                if let Some(side) = self.side_mut(pokemon.player) {
                    side.pokemon.iter_mut().for_each(|p| p.status = None);
                }
            }

            // === Boosts ===
            ServerMessage::Boost {
                pokemon,
                stat,
                amount,
            } => {
                self.referenced_mut(pokemon)?.boosts.boost(*stat, *amount);
            }

            ServerMessage::Unboost {
                pokemon,
                stat,
                amount,
            } => {
                self.referenced_mut(pokemon)?.boosts.boost(*stat, -*amount);
            }

            ServerMessage::SetBoost {
                pokemon,
                stat,
                amount,
            } => {
                self.referenced_mut(pokemon)?.boosts.set(*stat, *amount);
            }

            ServerMessage::ClearBoost(pokemon) => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.boosts.clear();
                }
            }

            ServerMessage::ClearAllBoost => {
                for side in self.sides_mut() {
                    for idx in side.active_indices.clone().into_iter().flatten() {
                        if let Some(poke) = side.pokemon.get_mut(idx) {
                            poke.boosts.clear();
                        }
                    }
                }
            }

            ServerMessage::ClearPositiveBoost { target } => {
                if let Some(poke) = self.find_mut(target) {
                    poke.boosts.clear_positive();
                }
            }

            ServerMessage::ClearNegativeBoost(pokemon) => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.boosts.clear_negative();
                }
            }

            ServerMessage::InvertBoost(pokemon) => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.boosts.invert();
                }
            }

            ServerMessage::CopyBoost { source, target } => {
                let copied = self.find_mut(source).map(|p| p.boosts);
                if let (Some(boosts), Some(poke)) = (copied, self.find_mut(target)) {
                    poke.boosts = boosts;
                }
            }

            ServerMessage::SwapBoost {
                source,
                target,
                stats,
            } => {
                let source_boosts = self.find_mut(source).map(|p| p.boosts);
                let target_boosts = self.find_mut(target).map(|p| p.boosts);
                if let (Some(src), Some(tgt)) = (source_boosts, target_boosts) {
                    let stats: Vec<_> = if stats.is_empty() {
                        pokellm_protocol::Stat::ALL.to_vec()
                    } else {
                        stats.clone()
                    };
                    if let Some(poke) = self.find_mut(source) {
                        for stat in &stats {
                            poke.boosts.set(*stat, tgt.get(*stat));
                        }
                    }
                    if let Some(poke) = self.find_mut(target) {
                        for stat in &stats {
                            poke.boosts.set(*stat, src.get(*stat));
                        }
                    }
                }
            }

            // === Volatiles ===
            ServerMessage::VolatileStart { pokemon, effect } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.volatiles.insert(Volatile::from_protocol(effect));
                }
            }

            ServerMessage::VolatileEnd { pokemon, effect } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.volatiles.remove(&Volatile::from_protocol(effect));
                }
            }

            ServerMessage::MustRecharge(pokemon) => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.volatiles.insert(Volatile::MustRecharge);
                }
            }

            // === Field ===
            ServerMessage::Weather { weather, upkeep } => {
                self.field.apply_weather(weather, *upkeep);
            }

            ServerMessage::FieldStart(condition) => self.field.apply_field_start(condition),
            ServerMessage::FieldEnd(condition) => self.field.apply_field_end(condition),

            ServerMessage::SideStart { side, condition } => {
                if let Some(condition) = SideCondition::from_protocol(condition) {
                    self.get_or_create_side(side.player, "")
                        .add_condition(condition);
                }
            }

            ServerMessage::SideEnd { side, condition } => {
                if let (Some(condition), Some(side)) = (
                    SideCondition::from_protocol(condition),
                    self.side_mut(side.player),
                ) {
                    side.remove_condition(condition);
                }
            }

            ServerMessage::SwapSideConditions => {
                if let [Some(p1), Some(p2)] = &mut self.sides {
                    std::mem::swap(&mut p1.conditions, &mut p2.conditions);
                }
            }

            // === Items, abilities, transformations ===
            ServerMessage::Item { pokemon, item } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.item = Some(item.clone());
                    poke.item_consumed = false;
                }
            }

            ServerMessage::EndItem { pokemon, item } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.item = Some(item.clone());
                    poke.item_consumed = true;
                }
            }

            ServerMessage::Ability { pokemon, ability } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.ability = Some(ability.clone());
                }
            }

            ServerMessage::EndAbility(pokemon) => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.volatiles
                        .insert(Volatile::Other("ability suppressed".to_string()));
                }
            }

            ServerMessage::Transform { pokemon, species } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.transformed_into = Some(species.clone());
                    poke.volatiles.insert(Volatile::Transformed);
                }
            }

            ServerMessage::Terastallize { pokemon, tera_type } => {
                if let Some(poke) = self.find_mut(pokemon) {
                    poke.terastallized = true;
                    poke.tera_type = Some(tera_type.clone());
                }
            }

            // === Move outcomes ===
            ServerMessage::SuperEffective(pokemon) => {
                self.record_matchup(pokemon, Effectiveness::SuperEffective)
            }
            ServerMessage::Resisted(pokemon) => {
                self.record_matchup(pokemon, Effectiveness::Resisted)
            }
            ServerMessage::Immune(pokemon) => self.record_matchup(pokemon, Effectiveness::Immune),

            // === Battle end ===
            ServerMessage::Win(winner) => {
                self.ended = true;
                self.winner = Some(winner.clone());
                self.request = None;
            }

            ServerMessage::Tie => {
                self.ended = true;
                self.tie = true;
                self.request = None;
            }

            _ => {}
        }

        Ok(())
    }

    /// Sync our side from a request, which carries full information
    /// (exact HP, moves, item, ability) for every party member.
    ///
    /// Active slots are left alone: requests arrive before the log lines of
    /// the turn they follow, so the log is the authority on who is active.
    pub(crate) fn apply_request(&mut self, request: BattleRequest) {
        if let Some(side_info) = &request.side
            && let Some(player) = side_info.player()
        {
            self.set_perspective(player);
            let side = self.get_or_create_side(player, &side_info.name);
            if !side_info.pokemon.is_empty() {
                side.team_size = Some(side_info.pokemon.len() as u8);
            }

            // Reorder our Pokemon into party order, keeping tracked field state
            let mut previous: Vec<Option<PokemonState>> =
                std::mem::take(&mut side.pokemon).into_iter().map(Some).collect();
            let mut remap = vec![None; previous.len()];

            for req_poke in &side_info.pokemon {
                let name = req_poke.name();
                let existing = previous
                    .iter()
                    .position(|p| p.as_ref().is_some_and(|p| p.name == name));
                let mut poke = match existing {
                    Some(old_idx) => {
                        remap[old_idx] = Some(side.pokemon.len());
                        previous[old_idx].take()
                    }
                    None => None,
                }
                .unwrap_or_else(|| PokemonState::new(name, &req_poke.parsed_details()));
                sync_from_request(&mut poke, req_poke);
                side.pokemon.push(poke);
            }

            for (old_idx, leftover) in previous.into_iter().enumerate() {
                if let Some(poke) = leftover {
                    remap[old_idx] = Some(side.pokemon.len());
                    side.pokemon.push(poke);
                }
            }

            for slot in side.active_indices.iter_mut() {
                *slot = slot.and_then(|old| remap.get(old).copied().flatten());
            }
        }

        self.request = Some(request);
    }

    /// Apply an `|inactive|` notice. `our_name` is compared against the
    /// user named in broadcast notices.
    pub(crate) fn apply_timer(&mut self, message: &str) {
        let our_name = self.me().map(|s| to_id(&s.username));
        if let Some(seconds) = parse_timer_seconds(message, our_name.as_deref()) {
            self.timer_seconds_left = Some(seconds);
        }
    }

    pub(crate) fn clear_timer(&mut self) {
        self.timer_seconds_left = None;
    }

    fn handle_switch(
        &mut self,
        pokemon: &Pokemon,
        details: &PokemonDetails,
        hp_status: Option<&HpStatus>,
    ) -> Result<(), String> {
        let slot = pokemon
            .position
            .and_then(position_to_slot)
            .ok_or_else(|| format!("switch of {} names no active slot", pokemon))?;
        let side = self.get_or_create_side(pokemon.player, "");
        if slot >= side.active_indices.len() {
            return Err(format!(
                "switch of {} into slot {} of a {}-slot side",
                pokemon,
                slot,
                side.active_indices.len()
            ));
        }

        let idx = match side.find_pokemon(&pokemon.name) {
            Some(idx) => idx,
            None => {
                side.pokemon.push(PokemonState::new(&pokemon.name, details));
                side.pokemon.len() - 1
            }
        };

        side.set_active(slot, idx);
        let poke = &mut side.pokemon[idx];
        poke.species = details.species.clone();
        if let Some(level) = details.level {
            poke.level = level;
        }
        if let Some(hp) = hp_status {
            poke.apply_hp_status(hp);
        }
        Ok(())
    }

    /// Illusion ended: the Pokemon in the slot was really `pokemon`
    fn handle_replace(
        &mut self,
        pokemon: &Pokemon,
        details: &PokemonDetails,
        hp_status: Option<&HpStatus>,
    ) -> Result<(), String> {
        let slot = pokemon
            .position
            .and_then(position_to_slot)
            .ok_or_else(|| format!("replace of {} names no active slot", pokemon))?;
        let side = self
            .side_mut(pokemon.player)
            .ok_or_else(|| format!("replace on unknown side {}", pokemon.player))?;
        let disguised = side
            .active_indices
            .get(slot)
            .copied()
            .flatten()
            .ok_or_else(|| format!("replace of {} into an empty slot", pokemon))?;

        let carried = {
            let old = &mut side.pokemon[disguised];
            old.active = false;
            (old.boosts, std::mem::take(&mut old.volatiles))
        };

        let idx = match side.find_pokemon(&pokemon.name) {
            Some(idx) => idx,
            None => {
                side.pokemon.push(PokemonState::new(&pokemon.name, details));
                side.pokemon.len() - 1
            }
        };
        side.active_indices[slot] = Some(idx);
        let poke = &mut side.pokemon[idx];
        poke.active = true;
        poke.boosts = carried.0;
        poke.volatiles = carried.1;
        if let Some(hp) = hp_status {
            poke.apply_hp_status(hp);
        }
        Ok(())
    }

    fn record_matchup(&mut self, defender: &Pokemon, effectiveness: Effectiveness) {
        let Some(pending) = self.pending_move.clone() else {
            return;
        };
        if pending.player == defender.player {
            return;
        }
        let defender_species = self
            .find_mut(defender)
            .map(|p| p.species.clone())
            .unwrap_or_else(|| defender.name.clone());

        let matchup = Matchup {
            attacker: pending.player,
            attacker_species: pending.species,
            move_id: pending.move_id,
            defender_species,
            effectiveness,
        };
        self.matchups.retain(|m| {
            !(m.attacker_species == matchup.attacker_species
                && m.move_id == matchup.move_id
                && m.defender_species == matchup.defender_species)
        });
        self.matchups.push(matchup);
        if self.matchups.len() > MAX_MATCHUPS {
            self.matchups.remove(0);
        }
    }

    /// Look up a Pokemon the way the log names it. With a position the
    /// Pokemon must be the one active in that slot; without one it must be
    /// known on its side.
    fn referenced_mut(&mut self, pokemon: &Pokemon) -> Result<&mut PokemonState, String> {
        let side = self
            .side_mut(pokemon.player)
            .ok_or_else(|| format!("{} is on an unknown side", pokemon))?;

        let idx = match pokemon.position {
            Some(pos) => {
                let idx = position_to_slot(pos)
                    .and_then(|slot| side.active_indices.get(slot).copied().flatten())
                    .ok_or_else(|| format!("{} is not active", pokemon))?;
                if side.pokemon[idx].name != pokemon.name {
                    return Err(format!(
                        "{} is not the active Pokemon (found {})",
                        pokemon, side.pokemon[idx].name
                    ));
                }
                idx
            }
            None => side
                .find_pokemon(&pokemon.name)
                .ok_or_else(|| format!("{} is unknown", pokemon))?,
        };

        Ok(&mut side.pokemon[idx])
    }

    fn find_mut(&mut self, pokemon: &Pokemon) -> Option<&mut PokemonState> {
        self.referenced_mut(pokemon).ok()
    }
}

fn sync_from_request(poke: &mut PokemonState, req: &SidePokemon) {
    let details = req.parsed_details();
    poke.species = details.species;
    if let Some(level) = details.level {
        poke.level = level;
    }
    if let Some(hp) = req.hp_status() {
        poke.apply_hp_status(&hp);
    }
    poke.known_moves = req.moves.clone();
    if !req.ability.is_empty() {
        poke.ability = Some(req.ability.clone());
    }
    if req.item.is_empty() {
        poke.item_consumed = poke.item.is_some();
    } else {
        poke.item = Some(req.item.clone());
        poke.item_consumed = false;
    }
    if let Some(tera) = &req.teratype {
        poke.tera_type = Some(tera.clone());
    }
    poke.terastallized = req.terastallized.as_deref().is_some_and(|t| !t.is_empty());
}

/// Seconds left on our clock from an `|inactive|` notice.
///
/// Private notices read "Time left: 150 sec this turn | 270 sec total";
/// broadcast ones read "NAME has 30 seconds left." and count only when
/// NAME is us.
pub fn parse_timer_seconds(message: &str, our_id: Option<&str>) -> Option<u32> {
    if let Some(rest) = message.strip_prefix("Time left: ") {
        return first_number(rest);
    }
    let (name, rest) = message.split_once(" has ")?;
    if !rest.contains("seconds left") || our_id != Some(to_id(name).as_str()) {
        return None;
    }
    first_number(rest)
}

fn first_number(s: &str) -> Option<u32> {
    s.split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokellm_protocol::{GameType, Player, Stat, parse_server_message};

    fn apply_lines(state: &mut BattleState, lines: &[&str]) {
        for line in lines {
            let msg = parse_server_message(line).unwrap();
            state.apply_message(&msg).unwrap();
        }
    }

    fn started() -> BattleState {
        let mut state = BattleState::new();
        apply_lines(
            &mut state,
            &[
                "|player|p1|bot|1|",
                "|player|p2|alice|2|",
                "|teamsize|p1|6",
                "|teamsize|p2|6",
                "|gametype|singles",
                "|gen|9",
                "|tier|[Gen 9] Random Battle",
                "|start",
                "|switch|p1a: Pikachu|Pikachu, L88, M|201/201",
                "|switch|p2a: Gyarados|Gyarados, L80, F|100/100",
                "|turn|1",
            ],
        );
        state.set_perspective(Player::P1);
        state
    }

    #[test]
    fn test_initial_switches() {
        let state = started();
        assert_eq!(state.game_type, Some(GameType::Singles));
        assert_eq!(state.turn, 1);
        assert_eq!(state.my_active().unwrap().name, "Pikachu");
        assert_eq!(state.my_active().unwrap().hp_max, 201);
        assert_eq!(state.opponent_active().unwrap().species, "Gyarados");
        assert_eq!(state.opponent().unwrap().unrevealed_count(), Some(5));
    }

    #[test]
    fn test_move_damage_and_matchup() {
        let mut state = started();
        apply_lines(
            &mut state,
            &[
                "|move|p1a: Pikachu|Thunderbolt|p2a: Gyarados",
                "|-supereffective|p2a: Gyarados",
                "|-damage|p2a: Gyarados|12/100",
                "|move|p2a: Gyarados|Dragon Dance|p2a: Gyarados",
                "|-boost|p2a: Gyarados|atk|1",
                "|-boost|p2a: Gyarados|spe|1",
            ],
        );

        let me = state.my_active().unwrap();
        assert_eq!(me.last_move.as_deref(), Some("thunderbolt"));

        let opp = state.opponent_active().unwrap();
        assert_eq!(opp.hp_percent(), 12);
        assert_eq!(opp.boosts.get(Stat::Spe), 1);
        assert_eq!(opp.known_moves, vec!["dragondance"]);

        let matchups: Vec<_> = state.matchups_for(Player::P1).collect();
        assert_eq!(matchups.len(), 1);
        assert_eq!(matchups[0].move_id, "thunderbolt");
        assert_eq!(matchups[0].defender_species, "Gyarados");
        assert_eq!(matchups[0].effectiveness, Effectiveness::SuperEffective);
    }

    #[test]
    fn test_unknown_or_inactive_pokemon_is_malformed() {
        let mut state = started();
        let damage_unknown = parse_server_message("|-damage|p2a: Mew|50/100").unwrap();
        assert!(state.apply_message(&damage_unknown).is_err());

        let boost_bench = parse_server_message("|-boost|p1a: Gyarados|atk|1").unwrap();
        assert!(state.apply_message(&boost_bench).is_err());

        // non-critical lines about unknown Pokemon are ignored
        let status_unknown = parse_server_message("|-status|p2a: Mew|par").unwrap();
        assert!(state.apply_message(&status_unknown).is_ok());
    }

    #[test]
    fn test_turn_going_backwards_is_malformed() {
        let mut state = started();
        let turn = parse_server_message("|turn|0").unwrap();
        assert!(state.apply_message(&turn).is_err());
        assert_eq!(state.turn, 1);
    }

    #[test]
    fn test_switch_into_missing_slot_is_malformed() {
        let mut state = started();
        let switch = parse_server_message("|switch|p2b: Mew|Mew|100/100").unwrap();
        assert!(state.apply_message(&switch).is_err());
    }

    #[test]
    fn test_faint_keeps_slot_until_replaced() {
        let mut state = started();
        apply_lines(
            &mut state,
            &["|-damage|p1a: Pikachu|0 fnt", "|faint|p1a: Pikachu"],
        );
        assert!(state.my_active_fainted());

        apply_lines(&mut state, &["|switch|p1a: Raichu|Raichu, L86|250/250"]);
        assert!(!state.my_active_fainted());
        assert_eq!(state.me().unwrap().fainted_count(), 1);
    }

    #[test]
    fn test_side_conditions_and_field() {
        let mut state = started();
        apply_lines(
            &mut state,
            &[
                "|-sidestart|p2: alice|Spikes",
                "|-sidestart|p2: alice|Spikes",
                "|-sidestart|p1: bot|move: Reflect",
                "|-weather|RainDance",
                "|-fieldstart|move: Psychic Terrain",
                "|-swapsideconditions",
            ],
        );
        assert_eq!(state.me().unwrap().layers(SideCondition::Spikes), 2);
        assert_eq!(state.opponent().unwrap().layers(SideCondition::Reflect), 1);
        assert!(state.field.weather.is_some_and(|w| w.is_rainy()));
        assert!(state.field.terrain.is_some());
    }

    #[test]
    fn test_switch_out_clears_volatiles() {
        let mut state = started();
        apply_lines(
            &mut state,
            &[
                "|move|p2a: Gyarados|Substitute|p2a: Gyarados",
                "|-start|p2a: Gyarados|Substitute",
                "|switch|p2a: Dragonite|Dragonite, L74, M|100/100",
            ],
        );
        let gyarados = &state.opponent().unwrap().pokemon[0];
        assert!(!gyarados.has_volatile(&Volatile::Substitute));
        assert!(!gyarados.active);
        assert_eq!(state.opponent_active().unwrap().name, "Dragonite");
    }

    #[test]
    fn test_apply_request_orders_party() {
        let mut state = started();
        let request: BattleRequest = serde_json::from_str(
            r#"{"active":[{"moves":[{"move":"Thunderbolt","id":"thunderbolt","pp":24,"maxpp":24,"target":"normal","disabled":false}]}],
                "side":{"name":"bot","id":"p1","pokemon":[
                    {"ident":"p1: Raichu","details":"Raichu, L86","condition":"250/250","active":false,"moves":["surf"],"baseAbility":"lightningrod","ability":"lightningrod","item":"choicespecs"},
                    {"ident":"p1: Pikachu","details":"Pikachu, L88, M","condition":"150/201 par","active":true,"moves":["thunderbolt"],"baseAbility":"static","ability":"static","item":"lightball"}
                ]},"rqid":2}"#,
        )
        .unwrap();

        state.apply_request(request);

        let me = state.me().unwrap();
        assert_eq!(me.pokemon[0].name, "Raichu");
        assert_eq!(me.pokemon[1].name, "Pikachu");
        assert_eq!(me.active_pokemon().unwrap().name, "Pikachu");
        assert_eq!(me.pokemon[1].status, Some(Status::Paralysis));
        assert_eq!(me.pokemon[0].item.as_deref(), Some("choicespecs"));
        assert_eq!(state.request.as_ref().and_then(|r| r.rqid), Some(2));
    }

    #[test]
    fn test_parse_timer_seconds() {
        assert_eq!(
            parse_timer_seconds("Time left: 150 sec this turn | 270 sec total", None),
            Some(150)
        );
        assert_eq!(
            parse_timer_seconds("LLM Bot has 30 seconds left.", Some("llmbot")),
            Some(30)
        );
        assert_eq!(
            parse_timer_seconds("alice has 30 seconds left.", Some("llmbot")),
            None
        );
        assert_eq!(
            parse_timer_seconds("Battle timer is ON: inactive players will automatically lose when time's up.", Some("llmbot")),
            None
        );
    }

    #[test]
    fn test_win_clears_request() {
        let mut state = started();
        apply_lines(&mut state, &["|win|bot"]);
        assert!(state.ended);
        assert_eq!(state.winner.as_deref(), Some("bot"));
        assert!(state.request.is_none());
    }
}
