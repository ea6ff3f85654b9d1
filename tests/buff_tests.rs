use gamestat::buff::{add, disable, offset};
use gamestat::effect::{arg, buffed, maxim, minim, turn};
use gamestat::*;
use std::sync::Arc;

fn fighter() -> Arc<ObjectType> {
    Arc::new(
        ObjectType::builder("Fighter")
            .point("HP", [arg(100), minim(0), maxim(100)])
            .value("ATK", [arg(10), buffed()])
            .build()
            .unwrap(),
    )
}

fn poison(duration: i64) -> Arc<ObjectType> {
    Arc::new(
        ObjectType::buff_builder("Poison")
            .value("effect", [arg(-1)])
            .point("duration", [arg(duration), turn(-1)])
            .is_disabled(Expr::stat("duration").lt(0))
            .target("HP", add(Expr::stat("effect")))
            .target("expire", disable(Expr::stat("is_disabled")))
            .build()
            .unwrap(),
    )
}

/// Test a ten-turn poison: one damage per turn, then it removes itself.
#[test]
fn test_buff_lifecycle() {
    let mut target = GameObject::new(&fighter(), InitValues::new()).unwrap();
    let buff = Buff::new(&poison(9), InitValues::new()).unwrap();
    target.attach_buff(buff).unwrap();

    for t in 1..=10 {
        target.turn().unwrap();
        assert_eq!(target.get("HP").unwrap(), StatValue::Int(100 - t), "turn {t}");
        let expected_buffs = if t < 10 { 1 } else { 0 };
        assert_eq!(target.buffs().len(), expected_buffs, "turn {t}");
    }

    target.turn().unwrap();
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(90));
}

/// Test that expiry is evaluated after the buff's own duration ticks.
#[test]
fn test_buff_expires_the_turn_duration_goes_negative() {
    let mut target = GameObject::new(&fighter(), InitValues::new()).unwrap();
    target
        .attach_buff(Buff::new(&poison(10), InitValues::new()).unwrap())
        .unwrap();

    for _ in 0..10 {
        target.turn().unwrap();
    }
    assert_eq!(target.buffs().len(), 1);
    assert_eq!(target.buffs()[0].get("duration").unwrap(), StatValue::Int(0));
    assert!(!target.buffs()[0].is_disabled().unwrap());

    target.turn().unwrap();
    assert!(target.buffs().is_empty());
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(89));

    target.turn().unwrap();
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(89));
}

/// Test that a buff removing itself does not disturb the buffs after it.
#[test]
fn test_self_removal_keeps_traversal_intact() {
    let strike = Arc::new(
        ObjectType::buff_builder("Strike")
            .target("HP", add(-5))
            .target("expire", disable(Expr::stat("is_disabled")))
            .build()
            .unwrap(),
    );
    let mut target = GameObject::new(&fighter(), InitValues::new()).unwrap();
    target
        .attach_buff(Buff::new(&strike, InitValues::new()).unwrap())
        .unwrap();
    target
        .attach_buff(Buff::new(&poison(3), InitValues::new()).unwrap())
        .unwrap();
    target
        .attach_buff(Buff::new(&strike, InitValues::new()).unwrap())
        .unwrap();

    target.turn().unwrap();

    // Both strikes hit once and left; the poison between them still ticked.
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(89));
    assert_eq!(target.buffs().len(), 1);
    assert_eq!(target.buffs()[0].type_name(), "Poison");
}

/// Test buffs handed to the constructor.
#[test]
fn test_buffs_at_construction() {
    let buff = Buff::new(&poison(0), InitValues::new().with("effect", -20)).unwrap();
    let mut target =
        GameObject::with_buffs(&fighter(), vec![buff], InitValues::new().with("HP", 50)).unwrap();
    assert_eq!(target.buffs().len(), 1);

    target.turn().unwrap();
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(30));
    assert!(target.buffs().is_empty());
}

/// Test that damage stops at the target's lower bound.
#[test]
fn test_add_respects_target_bounds() {
    let mut target = GameObject::new(&fighter(), InitValues::new().with("HP", 3)).unwrap();
    let buff = Buff::new(&poison(50), InitValues::new().with("effect", -2)).unwrap();
    target.attach_buff(buff).unwrap();

    for _ in 0..5 {
        target.turn().unwrap();
    }
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(0));
}

/// Test that a target attribute reads as its source on the buff.
#[test]
fn test_target_attribute_is_readable() {
    let buff = Buff::new(&poison(2), InitValues::new().with("effect", -7)).unwrap();
    assert_eq!(buff.get("HP").unwrap(), StatValue::Int(-7));
    assert_eq!(buff.get("expire").unwrap(), StatValue::Bool(false));
}

/// Test a read-time modifier that lasts exactly as long as its buff.
#[test]
fn test_buffed_modifier_follows_attachment() {
    let war_cry = Arc::new(
        ObjectType::buff_builder("WarCry")
            .point("duration", [arg(1), turn(-1)])
            .is_disabled(Expr::stat("duration").lt(0))
            .target("ATK", offset(5))
            .target("expire", disable(Expr::stat("is_disabled")))
            .build()
            .unwrap(),
    );
    let mut target = GameObject::new(&fighter(), InitValues::new()).unwrap();
    target
        .attach_buff(Buff::new(&war_cry, InitValues::new()).unwrap())
        .unwrap();

    assert_eq!(target.get("ATK").unwrap(), StatValue::Int(15));
    target.turn().unwrap();
    assert_eq!(target.get("ATK").unwrap(), StatValue::Int(15));
    target.turn().unwrap();
    assert_eq!(target.get("ATK").unwrap(), StatValue::Int(10));
    assert!(target.buffs().is_empty());
}

/// Test that external code may drop a buff from the live list.
#[test]
fn test_external_removal() {
    let mut target = GameObject::new(&fighter(), InitValues::new()).unwrap();
    let buff = Buff::new(&poison(9), InitValues::new()).unwrap();
    let id = buff.id();
    target.buffs_mut().push(buff);

    target.turn().unwrap();
    assert!(target.detach_buff(id).is_some());
    assert!(target.detach_buff(id).is_none());

    target.turn().unwrap();
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(99));
}

/// Detaches every other buff on the target.
#[derive(Debug)]
struct Cleanse {
    source: Expr,
}

impl TargetAction for Cleanse {
    fn source(&self) -> &Expr {
        &self.source
    }

    fn act(&self, _: &StatId, buff: &Buff, target: &mut GameObject) -> Result<(), StatError> {
        let others: Vec<BuffId> = target
            .buffs()
            .iter()
            .map(Buff::id)
            .filter(|id| *id != buff.id())
            .collect();
        for id in others {
            target.detach_buff(id);
        }
        Ok(())
    }
}

/// Test that a buff detached by an earlier one still takes the current turn.
#[test]
fn test_buff_detached_mid_turn_still_acts() {
    let purge = Arc::new(
        ObjectType::buff_builder("Purge")
            .target("cleanse", Arc::new(Cleanse { source: Expr::lit(true) }))
            .build()
            .unwrap(),
    );
    let dot = Arc::new(
        ObjectType::buff_builder("Dot")
            .target("HP", add(-1))
            .build()
            .unwrap(),
    );
    let mut target = GameObject::new(&fighter(), InitValues::new()).unwrap();
    target
        .attach_buff(Buff::new(&purge, InitValues::new()).unwrap())
        .unwrap();
    target
        .attach_buff(Buff::new(&dot, InitValues::new()).unwrap())
        .unwrap();

    target.turn().unwrap();
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(99));
    assert_eq!(target.buffs().len(), 1);
    assert_eq!(target.buffs()[0].type_name(), "Purge");

    target.turn().unwrap();
    assert_eq!(target.get("HP").unwrap(), StatValue::Int(99));
}
