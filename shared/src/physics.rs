use crate::{
    Side, BALL_ACCELERATION, BALL_INITIAL_SPEED, BALL_MAX_SPEED, BALL_RADIUS, MAX_BOUNCE_ANGLE,
    PADDLE_HEIGHT, PADDLE_WIDTH, WORLD_HEIGHT, WORLD_WIDTH,
};
use serde::{Deserialize, Serialize};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down.
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2 { x: 0.0, y: 0.0 }
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// The ball. `position` is its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub position: Vector2,
    pub velocity: Vector2,
    pub radius: f32,
}

impl Ball {
    pub fn new(position: Vector2, velocity: Vector2) -> Self {
        Self {
            position,
            velocity,
            radius: BALL_RADIUS,
        }
    }

    /// A fresh ball at the centre of the field, heading toward `toward` at
    /// `angle` radians off the horizontal.
    pub fn serve_from_center(toward: Side, angle: f32) -> Self {
        let velocity = Vector2::new(
            toward.toward() * BALL_INITIAL_SPEED * angle.cos(),
            BALL_INITIAL_SPEED * angle.sin(),
        );
        Ball::new(Vector2::new(WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0), velocity)
    }

    pub fn speed(&self) -> f32 {
        self.velocity.magnitude()
    }

    /// Explicit Euler step.
    pub fn integrate(&mut self, dt: f32) {
        self.position = self.position.add(&self.velocity.scale(dt));
    }

    /// Reflects off the top and bottom walls and clamps the ball back inside.
    /// Returns true if a wall was touched.
    pub fn bounce_off_walls(&mut self) -> bool {
        if self.position.y - self.radius <= 0.0 {
            self.position.y = self.radius;
            self.velocity.y = self.velocity.y.abs();
            true
        } else if self.position.y + self.radius >= WORLD_HEIGHT {
            self.position.y = WORLD_HEIGHT - self.radius;
            self.velocity.y = -self.velocity.y.abs();
            true
        } else {
            false
        }
    }

    /// The side whose goal line the ball has reached, if any.
    pub fn goal_reached(&self) -> Option<Side> {
        if self.position.x - self.radius <= 0.0 {
            Some(Side::Left)
        } else if self.position.x + self.radius >= WORLD_WIDTH {
            Some(Side::Right)
        } else {
            None
        }
    }

    /// True while the ball lies between the top and bottom walls with finite
    /// coordinates.
    pub fn is_inside_viewport(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.position.y - self.radius >= 0.0
            && self.position.y + self.radius <= WORLD_HEIGHT
    }

    /// Clamps the ball vertically into the viewport.
    pub fn snap_into_viewport(&mut self) {
        self.position.y = self
            .position
            .y
            .clamp(self.radius, WORLD_HEIGHT - self.radius);
    }
}

/// A paddle. `x`/`y` is its top-left corner; `velocity` is vertical only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub velocity: f32,
}

impl Paddle {
    /// A paddle vertically centred on its side of the field.
    pub fn new(side: Side) -> Self {
        Self {
            x: side.paddle_x(),
            y: (WORLD_HEIGHT - PADDLE_HEIGHT) / 2.0,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
            velocity: 0.0,
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Largest y the paddle may take while staying fully on screen.
    pub fn max_y(&self) -> f32 {
        WORLD_HEIGHT - self.height
    }
}

/// Axis-aligned circle/rectangle overlap test. Touching counts as overlap.
pub fn circle_intersects_rect(
    center: Vector2,
    radius: f32,
    rect_x: f32,
    rect_y: f32,
    rect_width: f32,
    rect_height: f32,
) -> bool {
    let closest_x = center.x.clamp(rect_x, rect_x + rect_width);
    let closest_y = center.y.clamp(rect_y, rect_y + rect_height);
    let dx = center.x - closest_x;
    let dy = center.y - closest_y;
    dx * dx + dy * dy <= radius * radius
}

/// Where on the paddle the ball struck, from -1 (top edge) to 1 (bottom edge).
pub fn contact_offset(ball: &Ball, paddle: &Paddle) -> f32 {
    let reach = paddle.height / 2.0 + ball.radius;
    ((ball.position.y - paddle.center_y()) / reach).clamp(-1.0, 1.0)
}

/// Bounces `ball` off the paddle guarding `side` if they overlap and the ball
/// is travelling toward that goal. Returns true on a hit.
///
/// The outgoing angle is proportional to the contact offset, so hits near
/// the paddle centre come back flat and edge hits leave at
/// `MAX_BOUNCE_ANGLE`. Speed grows by `BALL_ACCELERATION` up to
/// `BALL_MAX_SPEED`.
pub fn bounce_off_paddle(ball: &mut Ball, paddle: &Paddle, side: Side) -> bool {
    let approaching = ball.velocity.x * side.toward() > 0.0;
    if !approaching {
        return false;
    }

    // Ignore balls that already slipped behind the paddle.
    let in_front = match side {
        Side::Left => ball.position.x >= paddle.x,
        Side::Right => ball.position.x <= paddle.x + paddle.width,
    };
    if !in_front {
        return false;
    }

    if !circle_intersects_rect(
        ball.position,
        ball.radius,
        paddle.x,
        paddle.y,
        paddle.width,
        paddle.height,
    ) {
        return false;
    }

    let speed = (ball.speed() * BALL_ACCELERATION).clamp(BALL_INITIAL_SPEED, BALL_MAX_SPEED);
    let angle = contact_offset(ball, paddle) * MAX_BOUNCE_ANGLE;
    let away = -side.toward();

    ball.velocity = Vector2::new(away * speed * angle.cos(), speed * angle.sin());
    ball.position.x = match side {
        Side::Left => paddle.x + paddle.width + ball.radius,
        Side::Right => paddle.x - ball.radius,
    };
    true
}

/// Number of equal sub-steps needed so the ball never moves further than its
/// own radius in one step, which keeps it from tunnelling through a paddle.
pub fn required_substeps(speed: f32, dt: f32) -> u32 {
    const MAX_MOVEMENT_PER_STEP: f32 = BALL_RADIUS;

    let movement = speed * dt;
    if movement.is_finite() && movement > MAX_MOVEMENT_PER_STEP {
        (movement / MAX_MOVEMENT_PER_STEP).ceil() as u32
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TICK_DT;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vector_math() {
        let v = Vector2::new(3.0, 4.0);
        assert_approx_eq!(v.magnitude(), 5.0);
        let n = v.normalize();
        assert_approx_eq!(n.magnitude(), 1.0);
        assert_eq!(Vector2::default().normalize(), Vector2::default());
        assert_eq!(v.scale(2.0), Vector2::new(6.0, 8.0));
        assert_eq!(v.add(&Vector2::new(1.0, -1.0)), Vector2::new(4.0, 3.0));
        assert!(!Vector2::new(f32::NAN, 0.0).is_finite());
    }

    #[test]
    fn test_single_tick_integration() {
        let mut ball = Ball::new(Vector2::new(400.0, 300.0), Vector2::new(-528.0, 0.0));
        ball.integrate(TICK_DT);
        assert_approx_eq!(ball.position.x, 391.2, 0.001);
        assert_eq!(ball.position.y, 300.0);
    }

    #[test]
    fn test_serve_speed_and_direction() {
        let ball = Ball::serve_from_center(Side::Right, 0.3);
        assert_approx_eq!(ball.speed(), BALL_INITIAL_SPEED, 0.01);
        assert!(ball.velocity.x > 0.0);
        assert_eq!(ball.position, Vector2::new(400.0, 300.0));

        let ball = Ball::serve_from_center(Side::Left, -0.3);
        assert!(ball.velocity.x < 0.0);
        assert!(ball.velocity.y < 0.0);
    }

    #[test]
    fn test_wall_bounce_top() {
        let mut ball = Ball::new(Vector2::new(400.0, 3.0), Vector2::new(100.0, -200.0));
        assert!(ball.bounce_off_walls());
        assert_eq!(ball.position.y, BALL_RADIUS);
        assert_eq!(ball.velocity.y, 200.0);
        assert_eq!(ball.velocity.x, 100.0);
    }

    #[test]
    fn test_wall_bounce_bottom() {
        let mut ball = Ball::new(Vector2::new(400.0, 598.0), Vector2::new(0.0, 200.0));
        assert!(ball.bounce_off_walls());
        assert_eq!(ball.position.y, WORLD_HEIGHT - BALL_RADIUS);
        assert_eq!(ball.velocity.y, -200.0);
    }

    #[test]
    fn test_wall_bounce_keeps_speed() {
        let mut ball = Ball::new(Vector2::new(100.0, 1.0), Vector2::new(300.0, -400.0));
        let before = ball.speed();
        ball.bounce_off_walls();
        assert_approx_eq!(ball.speed(), before);
    }

    #[test]
    fn test_no_wall_contact_mid_field() {
        let mut ball = Ball::new(Vector2::new(400.0, 300.0), Vector2::new(0.0, 200.0));
        assert!(!ball.bounce_off_walls());
        assert_eq!(ball.velocity.y, 200.0);
    }

    #[test]
    fn test_goal_detection() {
        let ball = Ball::new(Vector2::new(5.0, 300.0), Vector2::default());
        assert_eq!(ball.goal_reached(), Some(Side::Left));
        let ball = Ball::new(Vector2::new(795.0, 300.0), Vector2::default());
        assert_eq!(ball.goal_reached(), Some(Side::Right));
        let ball = Ball::new(Vector2::new(400.0, 300.0), Vector2::default());
        assert_eq!(ball.goal_reached(), None);
    }

    #[test]
    fn test_viewport_snap() {
        let mut ball = Ball::new(Vector2::new(400.0, -30.0), Vector2::new(1.0, 1.0));
        assert!(!ball.is_inside_viewport());
        ball.snap_into_viewport();
        assert!(ball.is_inside_viewport());
        assert_eq!(ball.position.y, BALL_RADIUS);
    }

    #[test]
    fn test_circle_rect_overlap() {
        let c = Vector2::new(0.0, 0.0);
        assert!(circle_intersects_rect(c, 8.0, 5.0, -10.0, 10.0, 20.0));
        assert!(circle_intersects_rect(c, 8.0, 8.0, -10.0, 10.0, 20.0));
        assert!(!circle_intersects_rect(c, 8.0, 8.1, -10.0, 10.0, 20.0));
        // Corner: distance to (6, 6) is ~8.49
        assert!(!circle_intersects_rect(c, 8.0, 6.0, 6.0, 10.0, 10.0));
        assert!(circle_intersects_rect(c, 8.0, 5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_paddle_hit_reflects_and_accelerates() {
        let paddle = Paddle::new(Side::Left);
        let mut ball = Ball::new(
            Vector2::new(paddle.x + paddle.width + 4.0, paddle.center_y()),
            Vector2::new(-BALL_INITIAL_SPEED, 0.0),
        );

        assert!(bounce_off_paddle(&mut ball, &paddle, Side::Left));
        assert!(ball.velocity.x > 0.0);
        assert_approx_eq!(ball.velocity.y, 0.0);
        assert_approx_eq!(ball.speed(), BALL_INITIAL_SPEED * BALL_ACCELERATION, 0.01);
        assert_approx_eq!(ball.position.x, paddle.x + paddle.width + BALL_RADIUS);
    }

    #[test]
    fn test_paddle_hit_speed_capped() {
        let paddle = Paddle::new(Side::Right);
        let mut ball = Ball::new(
            Vector2::new(paddle.x - 4.0, paddle.center_y()),
            Vector2::new(BALL_MAX_SPEED, 0.0),
        );

        assert!(bounce_off_paddle(&mut ball, &paddle, Side::Right));
        assert!(ball.velocity.x < 0.0);
        assert_approx_eq!(ball.speed(), BALL_MAX_SPEED, 0.01);
        assert_approx_eq!(ball.position.x, paddle.x - BALL_RADIUS);
    }

    #[test]
    fn test_paddle_bounce_angle_symmetric() {
        let paddle = Paddle::new(Side::Left);
        let hit = |dy: f32| {
            let mut ball = Ball::new(
                Vector2::new(paddle.x + paddle.width + 2.0, paddle.center_y() + dy),
                Vector2::new(-600.0, 0.0),
            );
            assert!(bounce_off_paddle(&mut ball, &paddle, Side::Left));
            ball.velocity
        };

        let above = hit(-20.0);
        let below = hit(20.0);
        assert!(above.y < 0.0);
        assert!(below.y > 0.0);
        assert_approx_eq!(above.y, -below.y);
        assert_approx_eq!(above.x, below.x);

        // Edge hits leave at the steepest angle
        let mut ball = Ball::new(
            Vector2::new(
                paddle.x + paddle.width - 1.0,
                paddle.y + paddle.height + BALL_RADIUS,
            ),
            Vector2::new(-600.0, 0.0),
        );
        assert!(bounce_off_paddle(&mut ball, &paddle, Side::Left));
        let edge = ball.velocity;
        assert_approx_eq!(edge.y.atan2(edge.x), MAX_BOUNCE_ANGLE, 0.001);
    }

    #[test]
    fn test_paddle_ignores_receding_ball() {
        let paddle = Paddle::new(Side::Left);
        let mut ball = Ball::new(
            Vector2::new(paddle.x + paddle.width + 4.0, paddle.center_y()),
            Vector2::new(BALL_INITIAL_SPEED, 0.0),
        );
        let before = ball;
        assert!(!bounce_off_paddle(&mut ball, &paddle, Side::Left));
        assert_eq!(ball, before);
    }

    #[test]
    fn test_paddle_miss() {
        let paddle = Paddle::new(Side::Left);
        let mut ball = Ball::new(
            Vector2::new(paddle.x + paddle.width + 4.0, 20.0),
            Vector2::new(-BALL_INITIAL_SPEED, 0.0),
        );
        assert!(!bounce_off_paddle(&mut ball, &paddle, Side::Left));
    }

    #[test]
    fn test_ball_behind_paddle_not_returned() {
        let paddle = Paddle::new(Side::Left);
        let mut ball = Ball::new(
            Vector2::new(paddle.x - 2.0, paddle.center_y()),
            Vector2::new(-BALL_INITIAL_SPEED, 0.0),
        );
        assert!(!bounce_off_paddle(&mut ball, &paddle, Side::Left));
    }

    #[test]
    fn test_substep_calculation() {
        assert_eq!(required_substeps(100.0, TICK_DT), 1);
        assert_eq!(required_substeps(BALL_INITIAL_SPEED, TICK_DT), 2);
        // 1980 / 60 = 33 units per tick
        assert_eq!(required_substeps(BALL_MAX_SPEED, TICK_DT), 5);
        assert_eq!(required_substeps(f32::NAN, TICK_DT), 1);
    }
}
