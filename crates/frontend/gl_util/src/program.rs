//! Shader program wrapper and shader input lookups

use crate::create::create_program;
use crate::driver::GlDriver;
use crate::error::GlResult;
use std::rc::Rc;

/// Location of a vertex attribute, `None` when the program has no such input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    location: Option<u32>,
}

impl Attribute {
    pub fn location(&self) -> Option<u32> {
        self.location
    }

    pub fn is_found(&self) -> bool {
        self.location.is_some()
    }
}

/// Location of a uniform, `None` when the program has no such uniform.
///
/// Writing to a missing uniform is a no-op, matching GL's handling of -1.
pub struct Uniform<G: GlDriver> {
    location: Option<G::UniformLocation>,
}

impl<G: GlDriver> Uniform<G> {
    pub fn location(&self) -> Option<&G::UniformLocation> {
        self.location.as_ref()
    }

    pub fn is_found(&self) -> bool {
        self.location.is_some()
    }
}

impl<G: GlDriver> Clone for Uniform<G> {
    fn clone(&self) -> Self {
        Self {
            location: self.location.clone(),
        }
    }
}

/// A linked vertex + fragment shader program
pub struct Program<G: GlDriver> {
    gl: Rc<G>,
    program: Option<G::Program>,
}

impl<G: GlDriver> Program<G> {
    pub fn new(gl: &Rc<G>, vertex_source: &str, fragment_source: &str) -> GlResult<Self> {
        let program = create_program(gl.as_ref(), vertex_source, fragment_source)?;
        Ok(Self {
            gl: Rc::clone(gl),
            program: Some(program),
        })
    }

    pub fn attribute(&self, name: &str) -> Attribute {
        Attribute {
            location: self
                .program
                .and_then(|program| self.gl.get_attrib_location(program, name)),
        }
    }

    pub fn uniform(&self, name: &str) -> Uniform<G> {
        Uniform {
            location: self
                .program
                .and_then(|program| self.gl.get_uniform_location(program, name)),
        }
    }

    /// Make this the current program
    pub fn use_program(&self) {
        self.gl.use_program(self.program);
    }

    pub fn handle(&self) -> Option<G::Program> {
        self.program
    }

    pub fn destroy(&mut self) {
        if let Some(program) = self.program.take() {
            self.gl.delete_program(program);
        }
    }
}

impl<G: GlDriver> Drop for Program<G> {
    fn drop(&mut self) {
        self.destroy();
    }
}
