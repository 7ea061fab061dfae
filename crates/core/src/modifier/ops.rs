//! Pure per-column modifier operations
//!
//! Each operation reads the column, the per-pixel context and the modifier's
//! inputs, and updates only the texels of the channels its mode targets.

use crate::core_types::{FluidProperties, Texel, Vec2};

/// Mutable copy of one column's texels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColumnTexels {
    /// Outflow flux -x, +x, -z, +z
    pub outflow: Texel,
    pub depth: f32,
    pub color: Texel,
    pub esmv: Texel,
    /// Foam and custom data
    pub foam: Texel,
}

/// What the engine knows about one pixel of the footprint
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelContext {
    /// Modifier strength times multiplier times shape weight
    pub strength: f32,
    /// Fluid surface height above the modifier plane, in modifier space
    pub surface_offset: f32,
    /// Ground height above the modifier plane, in modifier space
    pub ground_offset: f32,
    /// Force direction in grid XZ, unit length or zero
    pub direction: Vec2,
}

/// Per-apply inputs shared by every pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierInputs {
    /// Fluid mixed in by the add modes
    pub fluid: Option<FluidProperties>,
    /// Target of color changes
    pub color: Texel,
    /// Target of material changes
    pub esmv: Texel,
    /// Which components color and material changes touch
    pub channels: [bool; 4],
    /// Removal may take more than the column holds
    pub overflow: bool,
}

/// Signature shared by every modifier operation
pub type PixelOp = fn(&mut ColumnTexels, &PixelContext, &ModifierInputs);

#[inline]
fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Add depth, mixing in the modifier fluid weighted by the added amount
fn add_depth(column: &mut ColumnTexels, amount: f32, inputs: &ModifierInputs) {
    if amount <= 0.0 {
        return;
    }
    if let Some(fluid) = &inputs.fluid {
        let old = column.depth.max(0.0);
        let total = old + amount;
        column.color = (column.color * old + fluid.color * amount) / total;
        column.esmv = (column.esmv * old + fluid.esmv() * amount) / total;
        column.foam = (column.foam * old + fluid.f123(0.0) * amount) / total;
    }
    column.depth += amount;
}

/// Remove depth; without overflow the column never goes below zero
fn remove_depth(column: &mut ColumnTexels, amount: f32, inputs: &ModifierInputs) {
    let amount = if inputs.overflow {
        amount
    } else {
        amount.min(column.depth.max(0.0))
    };
    if amount > 0.0 {
        column.depth -= amount;
    }
}

pub fn add_fluid(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    add_depth(column, ctx.strength, inputs);
}

pub fn add_fluid_clip(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    let room = (-ctx.surface_offset).max(0.0);
    add_depth(column, ctx.strength.min(room), inputs);
}

pub fn add_fluid_clip_inv(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    if ctx.ground_offset > 0.0 {
        add_depth(column, ctx.strength, inputs);
    }
}

pub fn add_fluid_below(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    if ctx.surface_offset < 0.0 {
        add_depth(column, ctx.strength, inputs);
    }
}

pub fn remove_fluid(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    remove_depth(column, ctx.strength, inputs);
}

pub fn remove_fluid_clip(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    if ctx.ground_offset < 0.0 {
        remove_depth(column, ctx.strength, inputs);
    }
}

pub fn remove_fluid_above(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    if ctx.surface_offset > 0.0 {
        remove_depth(column, ctx.strength, inputs);
    }
}

pub fn remove_fluid_above_clip(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    if ctx.surface_offset > 0.0 {
        remove_depth(column, ctx.strength.min(ctx.surface_offset), inputs);
    }
}

/// Split a direction into the four non-negative flux components
fn push(column: &mut ColumnTexels, direction: Vec2, strength: f32) {
    let force = direction * strength;
    column.outflow += Texel::new(
        (-force.x).max(0.0),
        force.x.max(0.0),
        (-force.y).max(0.0),
        force.y.max(0.0),
    );
}

pub fn add_force(column: &mut ColumnTexels, ctx: &PixelContext, _inputs: &ModifierInputs) {
    push(column, ctx.direction, ctx.strength);
}

pub fn add_force_uniform(column: &mut ColumnTexels, ctx: &PixelContext, _inputs: &ModifierInputs) {
    push(column, ctx.direction, ctx.strength);
}

pub fn dampen_force(column: &mut ColumnTexels, ctx: &PixelContext, _inputs: &ModifierInputs) {
    column.outflow *= 1.0 - clamp01(ctx.strength);
}

pub fn add_foam(column: &mut ColumnTexels, ctx: &PixelContext, _inputs: &ModifierInputs) {
    column.foam.x = (column.foam.x + ctx.strength).min(1.0);
}

pub fn add_foam_max(column: &mut ColumnTexels, ctx: &PixelContext, _inputs: &ModifierInputs) {
    column.foam.x = column.foam.x.max(clamp01(ctx.strength));
}

pub fn remove_foam(column: &mut ColumnTexels, ctx: &PixelContext, _inputs: &ModifierInputs) {
    column.foam.x = (column.foam.x - ctx.strength).max(0.0);
}

fn blend_channels(value: &mut Texel, target: &Texel, channels: [bool; 4], t: f32) {
    for i in 0..4 {
        if channels[i] {
            value[i] += (target[i] - value[i]) * t;
        }
    }
}

pub fn change_color(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    blend_channels(&mut column.color, &inputs.color, inputs.channels, clamp01(ctx.strength));
}

pub fn change_esmv(column: &mut ColumnTexels, ctx: &PixelContext, inputs: &ModifierInputs) {
    blend_channels(&mut column.esmv, &inputs.esmv, inputs.channels, clamp01(ctx.strength));
}
