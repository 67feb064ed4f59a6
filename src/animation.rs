//! A bounded up-and-down animation.
//!
//! [`Bounce`] counts steps between zero and a maximum height, turning around
//! at either end. It only advances while running; keys start and stop it.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Clone, Debug)]
pub struct Bounce {
    height: u32,
    max_height: u32,
    going_up: bool,
    running: bool,
}

impl Bounce {
    pub fn new(max_height: u32) -> Self {
        Self {
            height: 0,
            max_height,
            going_up: true,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Advances one step and returns its direction, or `None` when stopped.
    pub fn step(&mut self) -> Option<Direction> {
        if !self.running || self.max_height == 0 {
            return None;
        }
        if self.height >= self.max_height {
            self.going_up = false;
        } else if self.height == 0 {
            self.going_up = true;
        }
        if self.going_up {
            self.height += 1;
            Some(Direction::Up)
        } else {
            self.height -= 1;
            Some(Direction::Down)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_animation_does_not_move() {
        let mut bounce = Bounce::new(3);
        assert_eq!(bounce.step(), None);
        assert_eq!(bounce.height(), 0);
    }

    #[test]
    fn turns_around_at_both_ends() {
        let mut bounce = Bounce::new(2);
        bounce.start();
        let steps: Vec<_> = (0..6).map(|_| bounce.step().unwrap()).collect();
        use Direction::*;
        assert_eq!(steps, vec![Up, Up, Down, Down, Up, Up]);
        assert_eq!(bounce.height(), 2);
    }

    #[test]
    fn stop_keeps_height() {
        let mut bounce = Bounce::new(40);
        bounce.start();
        bounce.step();
        bounce.step();
        bounce.stop();
        assert_eq!(bounce.step(), None);
        assert_eq!(bounce.height(), 2);
    }
}
