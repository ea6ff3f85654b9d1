//! RPG example: a fighter, a poison and an apple
//!
//! This example shows:
//! - A derived stat (maxHP) and a clamped Point (HP) seeded from it
//! - Experience-driven growth feeding the derived stat
//! - A self-expiring buff that damages its target every turn
//! - Turn-based decay and a label computed from it
//! - What happens when two stats depend on each other

use gamestat::buff::{add, disable};
use gamestat::effect::{arg, default, grow, maxim, minim, turn};
use gamestat::*;
use std::sync::Arc;

fn fighter() -> Result<Arc<ObjectType>, StatError> {
    let max_hp = Expr::stat("maxHP");
    Ok(Arc::new(
        ObjectType::builder("Fighter")
            .value("STR", [arg(2), minim(0), grow(1.0)])
            .derived("maxHP", (Expr::stat("STR") + 1) * 10)
            .point("HP", [arg(max_hp.clone()), minim(0), maxim(max_hp)])
            .build()?,
    ))
}

fn poison() -> Result<Arc<ObjectType>, StatError> {
    Ok(Arc::new(
        ObjectType::buff_builder("Poison")
            .value("damage", [arg(-3)])
            .point("duration", [arg(4), turn(-1)])
            .is_disabled(Expr::stat("duration").lt(0))
            .target("HP", add(Expr::stat("damage")))
            .target("expire", disable(Expr::stat("is_disabled")))
            .build()?,
    ))
}

fn apple() -> Result<Arc<ObjectType>, StatError> {
    let fresh = Expr::stat("fresh");
    Ok(Arc::new(
        ObjectType::builder("Apple")
            .value("age", [default(0), turn(1)])
            .point("fresh", [arg(6), turn(-2)])
            .derived("name", "apple" + (" (rotten)" * fresh.lt(0)))
            .build()?,
    ))
}

fn main() -> Result<(), StatError> {
    println!("=== Fighter ===\n");
    let mut hero = GameObject::new(&fighter()?, InitValues::new())?;
    println!("STR: {}, maxHP: {}, HP: {}", hero.get("STR")?, hero.get("maxHP")?, hero.get("HP")?);

    hero.gain_pot("STR", 5)?;
    hero.gain_exp("STR", 2)?;
    println!(
        "After 2 exp -> STR: {}, maxHP: {}, potential left: {}",
        hero.get("STR")?,
        hero.get("maxHP")?,
        hero.potential("STR")?
    );

    hero.set("HP", 999)?;
    println!("HP set to 999 is clamped to {}\n", hero.get("HP")?);

    println!("=== Poison ===\n");
    hero.attach_buff(Buff::new(&poison()?, InitValues::new())?)?;
    for t in 1..=7 {
        hero.turn()?;
        println!("turn {t}: HP {}, buffs attached: {}", hero.get("HP")?, hero.buffs().len());
    }

    println!("\n=== Apple ===\n");
    let mut fruit = GameObject::new(&apple()?, InitValues::new())?;
    for _ in 0..5 {
        fruit.turn()?;
        println!(
            "age {}: fresh {}, name {:?}",
            fruit.get("age")?,
            fruit.get("fresh")?,
            fruit.get("name")?.to_string()
        );
    }

    println!("\n=== Cycle detection ===\n");
    let cyclic = ObjectType::builder("Broken")
        .derived("A", Expr::stat("B") + 1)
        .derived("B", Expr::stat("A") * 2)
        .build();
    match cyclic {
        Ok(_) => println!("ERROR: cycle not detected"),
        Err(e) => println!("Rejected as expected: {e}"),
    }

    println!("\n=== Readout ===\n");
    for (stat, value) in hero.readout()? {
        println!("{stat}: {value}");
    }
    Ok(())
}
