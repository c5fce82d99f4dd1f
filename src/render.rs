//! Render composition and pipeline batching.
//!
//! Scene nodes describe what they want drawn with a [`Render`] value; the
//! renderer walks it once per frame and sorts every [`Drawable`] into the
//! batch of the pipeline that draws it (front faces, back faces, and the
//! shadow casters drawn into the shadow map).

use crate::data_structures::model::Model;

/// A model together with the instance buffer that places it in the world.
pub struct Drawable<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub cast_shadow: bool,
}

/// Specifies how a scene object should be rendered.
///
/// - `None` renders nothing
/// - `Default(Drawable)` renders a single object with back-face culling
/// - `Backside(Drawable)` renders only the inside faces of an object
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Default(Drawable<'a>),
    Backside(Drawable<'a>),
    Composed(Vec<Render<'a>>),
}

/// Drawables sorted by the pipeline that renders them.
#[derive(Default)]
pub struct Batches<'a> {
    pub fronts: Vec<Drawable<'a>>,
    pub backs: Vec<Drawable<'a>>,
}

impl<'a> Batches<'a> {
    pub fn shadow_casters(&self) -> impl Iterator<Item = &Drawable<'a>> {
        self.fronts
            .iter()
            .chain(self.backs.iter())
            .filter(|drawable| drawable.cast_shadow)
    }
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(self, batches: &mut Batches<'a>) {
        match self {
            Render::Default(drawable) => batches.fronts.push(drawable),
            Render::Backside(drawable) => batches.backs.push(drawable),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
            Render::None => (),
        }
    }

    pub fn into_batches(self) -> Batches<'a> {
        let mut batches = Batches::default();
        self.set_pipelines(&mut batches);
        batches
    }
}
