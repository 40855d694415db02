//! 常用粒子与影响器

use glam::{Vec3, Vec4};

use super::particle_system::ParticleAffector;
use crate::core::error::AffectorError;

/// 简单粒子：位置、速度、颜色
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleParticle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Vec4,
}

impl SimpleParticle {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            velocity,
            color: Vec4::ONE,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }
}

/// 粒子属性访问器
///
/// 让同一个影响器可以作用于不同的粒子类型。
pub trait ParticleModifier<P>: Send + Sync {
    fn position(&self, particle: &P) -> Vec3;
    fn set_position(&self, particle: &mut P, position: Vec3);
    fn velocity(&self, particle: &P) -> Vec3;
    fn set_velocity(&self, particle: &mut P, velocity: Vec3);
}

/// `SimpleParticle` 的访问器
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleParticleModifier;

impl ParticleModifier<SimpleParticle> for SimpleParticleModifier {
    #[inline]
    fn position(&self, particle: &SimpleParticle) -> Vec3 {
        particle.position
    }

    #[inline]
    fn set_position(&self, particle: &mut SimpleParticle, position: Vec3) {
        particle.position = position;
    }

    #[inline]
    fn velocity(&self, particle: &SimpleParticle) -> Vec3 {
        particle.velocity
    }

    #[inline]
    fn set_velocity(&self, particle: &mut SimpleParticle, velocity: Vec3) {
        particle.velocity = velocity;
    }
}

/// 按速度移动粒子
#[derive(Debug, Clone, Default)]
pub struct MovementAffector<M> {
    modifier: M,
}

impl<M> MovementAffector<M> {
    pub fn new(modifier: M) -> Self {
        Self { modifier }
    }
}

impl<P, M: ParticleModifier<P>> ParticleAffector<P> for MovementAffector<M> {
    fn is_coalescable(&self) -> bool {
        true
    }

    fn affect(&self, particles: &mut [P], updates: usize) -> Result<(), AffectorError> {
        let steps = updates as f32;
        for particle in particles {
            let position =
                self.modifier.position(particle) + self.modifier.velocity(particle) * steps;
            self.modifier.set_position(particle, position);
        }
        Ok(())
    }
}

/// 对粒子速度施加恒定加速度
#[derive(Debug, Clone)]
pub struct GravityAffector<M> {
    modifier: M,
    gravity: Vec3,
}

impl<M> GravityAffector<M> {
    /// 默认重力：每次更新 -9.81/60 的 Y 方向速度增量
    pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81 / 60.0, 0.0);

    pub fn new(modifier: M) -> Self {
        Self::with_gravity(modifier, Self::DEFAULT_GRAVITY)
    }

    pub fn with_gravity(modifier: M, gravity: Vec3) -> Self {
        Self { modifier, gravity }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }
}

impl<P, M: ParticleModifier<P>> ParticleAffector<P> for GravityAffector<M> {
    fn is_coalescable(&self) -> bool {
        true
    }

    fn affect(&self, particles: &mut [P], updates: usize) -> Result<(), AffectorError> {
        let delta = self.gravity * updates as f32;
        for particle in particles {
            let velocity = self.modifier.velocity(particle) + delta;
            self.modifier.set_velocity(particle, velocity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_scales_with_updates() {
        let affector = MovementAffector::new(SimpleParticleModifier);
        let mut particles = [SimpleParticle::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 0.0))];

        affector.affect(&mut particles, 3).unwrap();

        assert_eq!(particles[0].position, Vec3::new(3.0, 6.0, 0.0));
    }

    #[test]
    fn test_gravity_changes_velocity_only() {
        let affector =
            GravityAffector::with_gravity(SimpleParticleModifier, Vec3::new(0.0, -1.0, 0.0));
        let mut particles = [SimpleParticle::new(Vec3::ONE, Vec3::ZERO)];

        affector.affect(&mut particles, 2).unwrap();

        assert_eq!(particles[0].velocity, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(particles[0].position, Vec3::ONE);
    }

    #[test]
    fn test_builtin_affectors_coalesce() {
        let movement = MovementAffector::new(SimpleParticleModifier);
        let gravity = GravityAffector::new(SimpleParticleModifier);
        assert!(ParticleAffector::<SimpleParticle>::is_coalescable(&movement));
        assert!(ParticleAffector::<SimpleParticle>::is_coalescable(&gravity));
    }
}
