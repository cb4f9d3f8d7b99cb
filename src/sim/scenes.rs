/// Scene scripts, keyed by id.

use super::dialogue::{Line, Side};

const fn broker(text: &'static str) -> Line {
    Line { side: Side::Left, portrait: Some("broker"), text }
}

const fn you(text: &'static str) -> Line {
    Line { side: Side::Right, portrait: Some("trader"), text }
}

const fn narrator(text: &'static str) -> Line {
    Line { side: Side::Left, portrait: None, text }
}

const TUTORIAL_INTRO: &[Line] = &[
    broker("Welcome to the floor. Each column is a stock; its height is the price."),
    broker("Step onto a column and you buy it with everything you hold."),
    broker("Step off and you sell at whatever the column is worth right then."),
    you("So I buy low and sell high."),
    broker("Everyone says that. Reach 2000 and walk out the door on the left."),
];

const TUTORIAL_LOSS: &[Line] = &[
    broker("You bought at the top and sold at the bottom."),
    broker("Watch the column before you jump. Let's try that again with three."),
];

const TUTORIAL_WIN: &[Line] = &[
    broker("Not bad. The real market has more than two columns."),
];

const SPIRAL_INTRO: &[Line] = &[
    narrator("The spiral turns slowly. Ride an arm upward, then step off before it falls."),
];

const PUMPING_INTRO: &[Line] = &[
    broker("This market listens to you. Press the action key to dump stock where you stand."),
    broker("The dip rings outward. Buy the trough, sell the crest."),
];

const MAZE_INTRO: &[Line] = &[
    narrator("Walls are priced out of reach. The money moves through the corridors."),
];

const SHARKS_INTRO: &[Line] = &[
    broker("Short sellers. Wherever they swim the price sinks."),
    you("And they're heading for me."),
];

const CLOCK_INTRO: &[Line] = &[
    narrator("Time is money. Literally."),
];

const FINALE: &[Line] = &[
    broker("You've seen every market we have."),
    you("Same time tomorrow?"),
    broker("The floor never closes."),
];

pub const SCENES: &[(&str, &[Line])] = &[
    ("tutorial_intro", TUTORIAL_INTRO),
    ("tutorial_loss", TUTORIAL_LOSS),
    ("tutorial_win", TUTORIAL_WIN),
    ("spiral_intro", SPIRAL_INTRO),
    ("pumping_intro", PUMPING_INTRO),
    ("maze_intro", MAZE_INTRO),
    ("sharks_intro", SHARKS_INTRO),
    ("clock_intro", CLOCK_INTRO),
    ("finale", FINALE),
];

pub fn scene(id: &str) -> Option<&'static [Line]> {
    SCENES.iter().find(|(k, _)| *k == id).map(|(_, lines)| *lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_ids_are_unique() {
        for (n, (id, _)) in SCENES.iter().enumerate() {
            assert!(SCENES[n + 1..].iter().all(|(other, _)| other != id), "{id}");
        }
    }

    #[test]
    fn lookup() {
        assert_eq!(scene("finale").map(|s| s.len()), Some(3));
        assert!(scene("nope").is_none());
    }
}
