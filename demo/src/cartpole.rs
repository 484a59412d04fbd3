use gym_stream_common::frame::Frame;
use gym_stream_wrapper::{Env, EnvMetadata, RenderMode, RenderOutput, Step};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
/// Half the pole's length.
const LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;
const THETA_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
const X_THRESHOLD: f64 = 2.4;

const SCREEN_WIDTH: u32 = 600;
const SCREEN_HEIGHT: u32 = 400;
const CART_Y: f64 = 100.0;
const CART_WIDTH: f64 = 50.0;
const CART_HEIGHT: f64 = 30.0;
const POLE_WIDTH: f64 = 10.0;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const POLE: Rgb<u8> = Rgb([202, 152, 101]);
const AXLE: Rgb<u8> = Rgb([129, 132, 203]);

/// Cart position, cart velocity, pole angle, pole angular velocity.
pub type State = [f64; 4];

/// Classic cart-pole balancing task. Action 1 pushes right, anything else
/// pushes left.
pub struct CartPole {
    metadata: EnvMetadata,
    render_mode: RenderMode,
    state: State,
    rng: StdRng,
}

impl CartPole {
    pub fn new(render_mode: RenderMode, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            metadata: EnvMetadata::new(vec![RenderMode::Human, RenderMode::RgbArray], 50),
            render_mode,
            state: [0.0; 4],
            rng,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn out_of_bounds(&self) -> bool {
        let [x, _, theta, _] = self.state;
        !(-X_THRESHOLD..=X_THRESHOLD).contains(&x)
            || !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&theta)
    }

    fn draw(&self) -> RgbImage {
        let mut img = RgbImage::from_pixel(SCREEN_WIDTH, SCREEN_HEIGHT, WHITE);
        let scale = SCREEN_WIDTH as f64 / (X_THRESHOLD * 2.0);
        let pole_len = scale * (2.0 * LENGTH);
        let [x, _, theta, _] = self.state;
        let cart_x = x * scale + SCREEN_WIDTH as f64 / 2.0;

        // track
        for px in 0..SCREEN_WIDTH {
            put(&mut img, px as f64, CART_Y, BLACK);
        }

        // cart
        let (left, right) = (cart_x - CART_WIDTH / 2.0, cart_x + CART_WIDTH / 2.0);
        let (bottom, top) = (CART_Y - CART_HEIGHT / 2.0, CART_Y + CART_HEIGHT / 2.0);
        let mut cy = bottom;
        while cy <= top {
            let mut cx = left;
            while cx <= right {
                put(&mut img, cx, cy, BLACK);
                cx += 1.0;
            }
            cy += 1.0;
        }

        // pole, leaning clockwise for positive theta
        let axle_y = CART_Y + CART_HEIGHT / 4.0;
        let (sin, cos) = theta.sin_cos();
        let mut along = 0.0;
        while along <= pole_len {
            let mut across = -POLE_WIDTH / 2.0;
            while across <= POLE_WIDTH / 2.0 {
                let px = cart_x + along * sin + across * cos;
                let py = axle_y + along * cos - across * sin;
                put(&mut img, px, py, POLE);
                across += 0.5;
            }
            along += 0.5;
        }

        // axle
        let r = POLE_WIDTH / 2.0;
        let mut dy = -r;
        while dy <= r {
            let mut dx = -r;
            while dx <= r {
                if dx * dx + dy * dy <= r * r {
                    put(&mut img, cart_x + dx, axle_y + dy, AXLE);
                }
                dx += 1.0;
            }
            dy += 1.0;
        }

        img
    }
}

/// Plot in world coordinates (origin bottom-left), skipping off-screen points.
fn put(img: &mut RgbImage, x: f64, y: f64, color: Rgb<u8>) {
    let row = SCREEN_HEIGHT as f64 - 1.0 - y.round();
    let col = x.round();
    if col < 0.0 || row < 0.0 || col >= SCREEN_WIDTH as f64 || row >= SCREEN_HEIGHT as f64 {
        return;
    }
    img.put_pixel(col as u32, row as u32, color);
}

impl Env for CartPole {
    type Obs = State;
    type Act = u32;

    fn metadata(&self) -> &EnvMetadata {
        &self.metadata
    }

    fn reset(&mut self, seed: Option<u64>) -> State {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        for v in self.state.iter_mut() {
            *v = self.rng.gen_range(-0.05..0.05);
        }
        self.state
    }

    fn step(&mut self, action: u32) -> Step<State> {
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if action == 1 { FORCE_MAG } else { -FORCE_MAG };
        let (sin, cos) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sin) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin - cos * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * cos * cos / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos / TOTAL_MASS;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];

        Step::new(self.state, 1.0, self.out_of_bounds(), false)
    }

    fn render(&mut self) -> RenderOutput {
        match self.render_mode {
            RenderMode::RgbArray => Frame::try_from(self.draw())
                .map_or(RenderOutput::Nothing, RenderOutput::Frame),
            RenderMode::Ansi => {
                let [x, _, theta, _] = self.state;
                RenderOutput::Text(format!("x={x:+.3} theta={theta:+.3}"))
            }
            RenderMode::Human => RenderOutput::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gym_stream_common::frame::FrameShape;

    #[test]
    fn reset_is_small_and_seeded() {
        let mut a = CartPole::new(RenderMode::RgbArray, None);
        let mut b = CartPole::new(RenderMode::RgbArray, None);
        let sa = a.reset(Some(7));
        let sb = b.reset(Some(7));
        assert_eq!(sa, sb);
        assert!(sa.iter().all(|v| v.abs() <= 0.05));
    }

    #[test]
    fn constant_push_terminates() {
        let mut env = CartPole::new(RenderMode::RgbArray, Some(1));
        env.reset(None);
        let mut steps = 0;
        loop {
            steps += 1;
            let step = env.step(1);
            assert_eq!(step.reward, 1.0);
            if step.terminated {
                break;
            }
            assert!(steps < 500, "pushing one way should topple the pole");
        }
    }

    #[test]
    fn rgb_array_render_is_screen_sized() {
        let mut env = CartPole::new(RenderMode::RgbArray, Some(3));
        env.reset(None);
        let RenderOutput::Frame(frame) = env.render() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.shape(), FrameShape::new(SCREEN_HEIGHT, SCREEN_WIDTH, 3));

        let img = frame.to_rgb_image().unwrap();
        // track at the left edge, away from the cart
        let track_row = SCREEN_HEIGHT - 1 - CART_Y as u32;
        assert_eq!(*img.get_pixel(0, track_row), BLACK);
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        // cart sits near the middle
        assert_eq!(*img.get_pixel(SCREEN_WIDTH / 2, track_row + 10), BLACK);
    }

    #[test]
    fn other_modes_do_not_return_frames() {
        let mut human = CartPole::new(RenderMode::Human, Some(0));
        assert_eq!(human.render(), RenderOutput::Nothing);
        let mut ansi = CartPole::new(RenderMode::Ansi, Some(0));
        assert!(matches!(ansi.render(), RenderOutput::Text(_)));
    }

    #[test]
    fn metadata_matches_gym() {
        let env = CartPole::new(RenderMode::RgbArray, None);
        assert_eq!(env.metadata().render_fps, Some(50));
        assert!(env.metadata().supports(RenderMode::RgbArray));
    }
}
